mod common;

use common::{read, write, MockBackend};
use std::path::PathBuf;
use stencil_render::batch::{resolve_snapshot, Batch, BatchReport, BatchTarget, FileOutcome};
use stencil_render::error::Error;
use stencil_render::fingerprint::{read_fingerprint, Fingerprint};
use stencil_render::invoker::{RenderPolicy, SkipReason};
use stencil_render::service::Diagnostic;
use stencil_render::writer::Output;
use tempfile::TempDir;

fn folder_batch<'a>(
    backend: &'a MockBackend,
    stencils: &TempDir,
    renders: &TempDir,
    policy: RenderPolicy,
) -> Batch<'a, MockBackend> {
    Batch::new(
        backend,
        "stack-1",
        backend.formation(),
        "snap-new",
        BatchTarget::Folder(stencils.path().to_path_buf()),
        Output::Path(renders.path().to_path_buf()),
        policy,
    )
}

#[test_log::test]
fn test_render_skip_rerender_scenario() {
    let stencils = TempDir::new().unwrap();
    let renders = TempDir::new().unwrap();
    let backend = MockBackend::new(&["app.yml"]);
    let source = stencils.path().join("app.yml");
    let output = renders.path().join("app.yml");

    write(&source, "A");
    let batch = folder_batch(&backend, &stencils, &renders, RenderPolicy::default());
    let report = batch.run().unwrap();
    assert_eq!(report.rendered, 1);
    assert_eq!(backend.render_calls(), 1);
    assert_eq!(read_fingerprint(&output), Some(Fingerprint::of(b"A")));
    assert_eq!(
        read(&output),
        format!("# cx.checksum: {}\nrendered: A", Fingerprint::of(b"A"))
    );

    let report = batch.run().unwrap();
    assert_eq!(
        report,
        BatchReport {
            unchanged: 1,
            ..Default::default()
        }
    );
    assert_eq!(backend.render_calls(), 1);

    write(&source, "B");
    batch.run().unwrap();
    assert_eq!(backend.render_calls(), 2);
    assert_eq!(read_fingerprint(&output), Some(Fingerprint::of(b"B")));
}

#[test]
fn test_unchanged_source_is_not_rewritten() {
    let stencils = TempDir::new().unwrap();
    let renders = TempDir::new().unwrap();
    let backend = MockBackend::new(&["app.yml"]);
    write(stencils.path().join("app.yml"), "A");

    let batch = folder_batch(&backend, &stencils, &renders, RenderPolicy::default());
    batch.run().unwrap();
    let output = renders.path().join("app.yml");
    let modified = std::fs::metadata(&output).unwrap().modified().unwrap();

    std::thread::sleep(std::time::Duration::from_millis(20));
    batch.run().unwrap();
    assert_eq!(
        std::fs::metadata(&output).unwrap().modified().unwrap(),
        modified
    );
}

#[test]
fn test_single_error_suppresses_output() {
    let stencils = TempDir::new().unwrap();
    let renders = TempDir::new().unwrap();
    let backend = MockBackend::new(&["app.yml"])
        .respond("app.yml", &["partial"], vec![Diagnostic::error("missing key", "app.yml")]);
    write(stencils.path().join("app.yml"), "A");

    let report = folder_batch(&backend, &stencils, &renders, RenderPolicy::default())
        .run()
        .unwrap();
    assert_eq!(report.suppressed, 1);
    assert_eq!(std::fs::read_dir(renders.path()).unwrap().count(), 0);
}

#[test]
fn test_ignore_errors_writes_output() {
    let stencils = TempDir::new().unwrap();
    let renders = TempDir::new().unwrap();
    let backend = MockBackend::new(&["app.yml"])
        .respond("app.yml", &["partial"], vec![Diagnostic::error("missing key", "app.yml")]);
    write(stencils.path().join("app.yml"), "A");

    let policy = RenderPolicy {
        ignore_errors: true,
        ignore_warnings: false,
    };
    let report = folder_batch(&backend, &stencils, &renders, policy).run().unwrap();
    assert_eq!(report.rendered, 1);
    assert!(read(renders.path().join("app.yml")).ends_with("\npartial"));
}

#[test]
fn test_warning_policy() {
    let stencils = TempDir::new().unwrap();
    let backend = MockBackend::new(&["app.yml"])
        .respond("app.yml", &["content"], vec![Diagnostic::warning("deprecated", "app.yml")]);
    write(stencils.path().join("app.yml"), "A");

    let renders = TempDir::new().unwrap();
    let report = folder_batch(&backend, &stencils, &renders, RenderPolicy::default())
        .run()
        .unwrap();
    assert_eq!(report.suppressed, 1);
    assert!(!renders.path().join("app.yml").exists());

    let policy = RenderPolicy {
        ignore_errors: false,
        ignore_warnings: true,
    };
    let report = folder_batch(&backend, &stencils, &renders, policy).run().unwrap();
    assert_eq!(report.rendered, 1);
    assert!(renders.path().join("app.yml").exists());
}

#[test]
fn test_ignored_warnings_do_not_lift_errors() {
    let stencils = TempDir::new().unwrap();
    let renders = TempDir::new().unwrap();
    let backend = MockBackend::new(&["app.yml"]).respond(
        "app.yml",
        &["content"],
        vec![Diagnostic::error("bad", "app.yml"), Diagnostic::warning("meh", "app.yml")],
    );
    write(stencils.path().join("app.yml"), "A");

    let policy = RenderPolicy {
        ignore_errors: false,
        ignore_warnings: true,
    };
    let report = folder_batch(&backend, &stencils, &renders, policy).run().unwrap();
    assert_eq!(report.suppressed, 1);
    assert!(!renders.path().join("app.yml").exists());
}

#[test]
fn test_folder_enumeration_skips_marker_and_partials() {
    let stencils = TempDir::new().unwrap();
    write(stencils.path().join("b.yml"), "B");
    write(stencils.path().join("a.yml"), "A");
    write(stencils.path().join("_helpers.yml"), "H");
    write(stencils.path().join(".pause"), "");
    std::fs::create_dir(stencils.path().join("nested")).unwrap();

    let files = BatchTarget::Folder(stencils.path().to_path_buf()).enumerate().unwrap();
    assert_eq!(
        files,
        vec![stencils.path().join("a.yml"), stencils.path().join("b.yml")]
    );
}

#[test]
fn test_collision_character_renamed_in_output() {
    let stencils = TempDir::new().unwrap();
    let renders = TempDir::new().unwrap();
    let backend = MockBackend::new(&["web@service.yml"]);
    write(stencils.path().join("web@service.yml"), "A");

    folder_batch(&backend, &stencils, &renders, RenderPolicy::default())
        .run()
        .unwrap();
    assert!(renders.path().join("web-service.yml").exists());
    assert!(!renders.path().join("web@service.yml").exists());
}

#[test]
fn test_failures_do_not_stop_siblings() {
    let stencils = TempDir::new().unwrap();
    let renders = TempDir::new().unwrap();
    let backend = MockBackend::new(&["b.yml"]);
    write(stencils.path().join("a.yml"), "A");
    write(stencils.path().join("b.yml"), "B");

    let report = folder_batch(&backend, &stencils, &renders, RenderPolicy::default())
        .run()
        .unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.rendered, 1);
    assert_eq!(backend.rendered_stencils(), vec![common::uid("b.yml")]);
}

#[test]
fn test_empty_folder_is_fatal() {
    let stencils = TempDir::new().unwrap();
    let renders = TempDir::new().unwrap();
    write(stencils.path().join(".pause"), "");
    let backend = MockBackend::new(&[]);

    let result = folder_batch(&backend, &stencils, &renders, RenderPolicy::default()).run();
    assert!(matches!(result, Err(Error::NothingToRender)));
}

#[test]
fn test_empty_stencil_is_skipped() {
    let stencils = TempDir::new().unwrap();
    let renders = TempDir::new().unwrap();
    let backend = MockBackend::new(&["app.yml"]);
    write(stencils.path().join("app.yml"), "");

    let batch = folder_batch(&backend, &stencils, &renders, RenderPolicy::default());
    let outcome = batch.render_file(&stencils.path().join("app.yml")).unwrap();
    assert_eq!(outcome, FileOutcome::Skipped(SkipReason::Empty));
    assert_eq!(backend.render_calls(), 0);
}

#[test]
fn test_single_file_target_writes_to_output_file() {
    let stencils = TempDir::new().unwrap();
    let renders = TempDir::new().unwrap();
    let backend = MockBackend::new(&["app@web.yml"]);
    let source = stencils.path().join("app@web.yml");
    let output = renders.path().join("nested").join("out.yml");
    write(&source, "A");

    let batch = Batch::new(
        &backend,
        "stack-1",
        backend.formation(),
        "snap-new",
        BatchTarget::File(source.clone()),
        Output::Path(output.clone()),
        RenderPolicy::default(),
    );
    let report = batch.run().unwrap();
    assert_eq!(report.rendered, 1);
    assert_eq!(read_fingerprint(&output), Some(Fingerprint::of(b"A")));
    assert_eq!(batch.destination(&source), Output::Path(output));
}

#[test]
fn test_multiple_documents_share_one_marker() {
    let stencils = TempDir::new().unwrap();
    let renders = TempDir::new().unwrap();
    let backend = MockBackend::new(&["app.yml"]).respond("app.yml", &["a: 1\n", "b: 2\n"], vec![]);
    write(stencils.path().join("app.yml"), "A");

    folder_batch(&backend, &stencils, &renders, RenderPolicy::default())
        .run()
        .unwrap();
    let content = read(renders.path().join("app.yml"));
    assert_eq!(content.matches("# cx.checksum:").count(), 1);
    assert!(content.ends_with("a: 1\n---\nb: 2\n"));
}

#[test]
fn test_nothing_rendered_writes_nothing() {
    let stencils = TempDir::new().unwrap();
    let renders = TempDir::new().unwrap();
    let backend = MockBackend::new(&["app.yml"]).respond("app.yml", &[], vec![]);
    write(stencils.path().join("app.yml"), "A");

    let report = folder_batch(&backend, &stencils, &renders, RenderPolicy::default())
        .run()
        .unwrap();
    assert_eq!(report.skipped, 1);
    assert!(!renders.path().join("app.yml").exists());
}

#[test]
fn test_output_folder_is_created() {
    let stencils = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let outdir: PathBuf = scratch.path().join("renders").join("web");
    let backend = MockBackend::new(&["app.yml"]);
    write(stencils.path().join("app.yml"), "A");

    let batch = Batch::new(
        &backend,
        "stack-1",
        backend.formation(),
        "snap-new",
        BatchTarget::Folder(stencils.path().to_path_buf()),
        Output::Path(outdir.clone()),
        RenderPolicy::default(),
    );
    batch.run().unwrap();
    assert!(outdir.join("app.yml").is_file());
}

#[test]
fn test_resolve_snapshot() {
    let backend = MockBackend::new(&[]);
    let resolved = resolve_snapshot(&backend, "stack-1", None).unwrap();
    assert_eq!(resolved, "snap-new");
    let resolved = resolve_snapshot(&backend, "stack-1", Some("latest")).unwrap();
    assert_eq!(resolved, "snap-new");
    let resolved = resolve_snapshot(&backend, "stack-1", Some("snap-old")).unwrap();
    assert_eq!(resolved, "snap-old");

    let empty = MockBackend::new(&[]).without_snapshots();
    assert!(matches!(
        resolve_snapshot(&empty, "stack-1", None),
        Err(Error::NoSnapshots { stack }) if stack == "stack-1"
    ));
    let resolved = resolve_snapshot(&empty, "stack-1", Some("snap-x")).unwrap();
    assert_eq!(resolved, "snap-x");
}

#[test]
fn test_missing_stencil_file_is_fatal() {
    let stencils = TempDir::new().unwrap();
    let renders = TempDir::new().unwrap();
    let backend = MockBackend::new(&["app.yml"]);

    let batch = Batch::new(
        &backend,
        "stack-1",
        backend.formation(),
        "snap-new",
        BatchTarget::File(stencils.path().join("app.yml")),
        Output::Path(renders.path().join("app.yml")),
        RenderPolicy::default(),
    );
    let err = batch.run().unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(
        err,
        Error::ConfigError(message) if message.starts_with("Cannot find")
    ));
    assert_eq!(backend.render_calls(), 0);
}
