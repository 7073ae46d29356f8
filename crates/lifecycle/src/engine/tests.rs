use super::*;
use crate::dispose::TrashDirectory;
use crate::error::ErrorKind;
use crate::listing;
use logkeeper_compress::error::{ErrorKind as CodecErrorKind, Result as CodecResult};
use logkeeper_compress::{Codec, Zstd};
use rstest::rstest;
use std::path::PathBuf;
use std::sync::atomic::AtomicUsize;
use std::sync::{Condvar, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use time::OffsetDateTime;

const TIMEOUT: Duration = Duration::from_secs(10);

struct Fixture {
    _dir: TempDir,
    logs: PathBuf,
    trash: PathBuf,
}
impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        let trash = dir.path().join("trash");
        std::fs::create_dir_all(&logs).unwrap();
        Self { _dir: dir, logs, trash }
    }

    fn write(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.logs.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn names(&self) -> Vec<String> {
        listing::snapshot(&self.logs).unwrap().into_iter().map(|file| file.name).collect()
    }

    fn builder(&self) -> EngineBuilder {
        LifecycleEngine::builder(Arc::new(TrashDirectory::new(&self.trash).unwrap()))
    }

    fn engine(&self) -> LifecycleEngine {
        self.builder().build(Handle::current())
    }
}

async fn settle(batch: &Batch) {
    tokio::time::timeout(TIMEOUT, batch.wait()).await.unwrap();
}

/// A name carrying today's date, so its age is always 0.
fn dated_today(prefix: &str, extension: &str) -> String {
    let today = OffsetDateTime::now_utc().to_offset(crate::age::local_offset()).date();
    format!("{prefix}_{:04}{:02}{:02}{extension}", today.year(), u8::from(today.month()), today.day())
}

/// Blocks inside the codec until released.
#[derive(Default)]
struct Gate {
    open: Mutex<bool>,
    released: Condvar,
}
impl Gate {
    fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.released.notify_all();
    }

    fn pass(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.released.wait(open).unwrap();
        }
    }
}

struct GatedCodec {
    gate: Arc<Gate>,
}
impl Codec for GatedCodec {
    fn compress(&self, input: &[u8]) -> CodecResult<Vec<u8>> {
        self.gate.pass();
        Zstd::default().compress(input)
    }

    fn decompress(&self, input: &[u8]) -> CodecResult<Vec<u8>> {
        self.gate.pass();
        Zstd::default().decompress(input)
    }
}

struct FailingCodec;
impl Codec for FailingCodec {
    fn compress(&self, _input: &[u8]) -> CodecResult<Vec<u8>> {
        exn::bail!(CodecErrorKind::Encoder)
    }

    fn decompress(&self, _input: &[u8]) -> CodecResult<Vec<u8>> {
        exn::bail!(CodecErrorKind::InvalidData)
    }
}

/// Records how many calls overlap.
#[derive(Default)]
struct CountingCodec {
    current: AtomicUsize,
    peak: AtomicUsize,
}
impl Codec for CountingCodec {
    fn compress(&self, input: &[u8]) -> CodecResult<Vec<u8>> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20));
        self.current.fetch_sub(1, Ordering::SeqCst);
        Zstd::default().compress(input)
    }

    fn decompress(&self, input: &[u8]) -> CodecResult<Vec<u8>> {
        Zstd::default().decompress(input)
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_round_trip_restores_name_and_content() {
    let fx = Fixture::new();
    let engine = fx.engine();
    let contents = b"2024-01-01 INFO started\n".repeat(64);
    let path = fx.write("app_log_20240101.log", &contents);

    settle(&engine.compress_one(&path).unwrap()).await;
    let archive = fx.logs.join("app_log_20240101.log.zst");
    assert!(!path.exists());
    assert_eq!(Zstd::default().decompress(&std::fs::read(&archive).unwrap()).unwrap(), contents);

    settle(&engine.decompress_one(&archive).unwrap()).await;
    assert_eq!(fx.names(), ["app_log_20240101.log"]);
    assert_eq!(std::fs::read(&path).unwrap(), contents);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_is_working_spans_the_whole_task() {
    let fx = Fixture::new();
    let gate = Arc::new(Gate::default());
    let engine = fx.builder().codec(Arc::new(GatedCodec { gate: gate.clone() })).build(Handle::current());
    let path = fx.write("app.log", b"hello");
    assert!(!engine.is_working());

    let batch = engine.compress_one(&path).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(engine.is_working());
    assert_eq!(engine.active_workers(), 1);
    assert!(!batch.is_done());
    assert!(!engine.need_refresh());

    gate.open();
    settle(&batch).await;
    assert!(!engine.is_working());
    assert!(engine.need_refresh());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_codec_failure_leaves_source_untouched() {
    let fx = Fixture::new();
    let engine = fx.builder().codec(Arc::new(FailingCodec)).build(Handle::current());
    let raw = fx.write("app.log", b"raw contents");
    let archive = fx.write("old.log.zst", b"not really zstd");

    settle(&engine.compress_one(&raw).unwrap()).await;
    settle(&engine.decompress_one(&archive).unwrap()).await;

    assert_eq!(std::fs::read(&raw).unwrap(), b"raw contents");
    assert_eq!(std::fs::read(&archive).unwrap(), b"not really zstd");
    assert_eq!(fx.names(), ["app.log", "old.log.zst"]);
    assert_eq!(engine.active_workers(), 0);
    assert!(!engine.need_refresh());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_existing_archive_is_not_clobbered() {
    let fx = Fixture::new();
    let engine = fx.engine();
    let raw = fx.write("app.log", b"new");
    let archive = fx.write("app.log.zst", b"old archive");

    let err = engine.compress_one(&raw).unwrap_err();
    assert!(matches!(&*err, ErrorKind::AlreadyExists(p) if p == &archive));
    engine.wait_idle().await;

    assert_eq!(std::fs::read(&raw).unwrap(), b"new");
    assert_eq!(std::fs::read(&archive).unwrap(), b"old archive");
    assert!(!engine.is_working());
    assert!(!engine.need_refresh());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_existing_raw_file_blocks_decompress() {
    let fx = Fixture::new();
    let engine = fx.engine();
    fx.write("app.log", b"current");
    let archive = fx.write("app.log.zst", b"archived");

    let err = engine.decompress_one(&archive).unwrap_err();
    assert!(matches!(&*err, ErrorKind::AlreadyExists(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_precondition_errors() {
    let fx = Fixture::new();
    let engine = fx.engine();
    let notes = fx.write("notes.txt", b"notes");
    let raw = fx.write("app.log", b"log");

    let err = engine.compress_one(fx.logs.join("missing.log")).unwrap_err();
    assert!(matches!(&*err, ErrorKind::NotFound(_)));
    let err = engine.compress_one(&notes).unwrap_err();
    assert!(matches!(&*err, ErrorKind::WrongExtension(_)));
    // Without the archive suffix there is no destination to collide with.
    let err = engine.decompress_one(&raw).unwrap_err();
    assert!(matches!(&*err, ErrorKind::WrongExtension(p) if p == &raw));
    let err = engine.delete_one(fx.logs.join("missing.log"), true).unwrap_err();
    assert!(matches!(&*err, ErrorKind::NotFound(_)));
    assert!(err.is_precondition());
    assert!(!engine.is_working());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_locked_file_is_rejected() {
    use fs2::FileExt;

    let fx = Fixture::new();
    let engine = fx.engine();
    let path = fx.write("busy.log", b"in use");
    let writer = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
    FileExt::lock_exclusive(&writer).unwrap();

    let err = engine.compress_one(&path).unwrap_err();
    assert!(matches!(&*err, ErrorKind::Locked(_)));

    // Listing forms skip it silently.
    let files = listing::snapshot(&fx.logs).unwrap();
    settle(&engine.compress_listing(&files)).await;
    assert_eq!(fx.names(), ["busy.log"]);

    drop(writer);
    settle(&engine.compress_listing(&files)).await;
    assert_eq!(fx.names(), ["busy.log.zst"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_compress_many_archives_every_file() {
    let fx = Fixture::new();
    let engine = fx.engine();
    let paths: Vec<_> = (0..8).map(|i| fx.write(&format!("app_{i}.log"), format!("file {i}\n").as_bytes())).collect();

    settle(&engine.compress_many(&paths)).await;

    for (i, path) in paths.iter().enumerate() {
        assert!(!path.exists());
        let archive = std::fs::read(listing::archived_path(path)).unwrap();
        assert_eq!(Zstd::default().decompress(&archive).unwrap(), format!("file {i}\n").as_bytes());
    }
    assert!(engine.need_refresh());
    assert!(!engine.need_refresh());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_max_workers_bounds_concurrency() {
    let fx = Fixture::new();
    let codec = Arc::new(CountingCodec::default());
    let engine = fx.builder().codec(codec.clone()).max_workers(Some(1)).build(Handle::current());
    let paths: Vec<_> = (0..4).map(|i| fx.write(&format!("app_{i}.log"), b"data")).collect();

    settle(&engine.compress_many(paths)).await;

    assert_eq!(codec.peak.load(Ordering::SeqCst), 1);
    assert_eq!(fx.names().len(), 4);
    assert!(fx.names().iter().all(|name| name.ends_with(".log.zst")));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_need_refresh_stays_false_when_everything_is_rejected() {
    let fx = Fixture::new();
    let engine = fx.engine();
    fx.write("app.log.zst", b"existing");
    let paths = [fx.write("app.log", b"raw"), fx.write("notes.txt", b"notes"), fx.logs.join("missing.log")];

    settle(&engine.compress_many(paths)).await;

    assert!(!engine.need_refresh());
    assert_eq!(engine.active_workers(), 0);
    assert_eq!(fx.names(), ["app.log", "app.log.zst", "notes.txt"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_decompress_listing_only_touches_archives() {
    let fx = Fixture::new();
    let engine = fx.engine();
    let archive = Zstd::default().compress(b"restored").unwrap();
    fx.write("a.log.zst", &archive);
    fx.write("b.log", b"raw");
    fx.write("c.txt", b"other");

    let files = listing::snapshot(&fx.logs).unwrap();
    settle(&engine.decompress_listing(&files)).await;

    assert_eq!(fx.names(), ["a.log", "b.log", "c.txt"]);
    assert_eq!(std::fs::read(fx.logs.join("a.log")).unwrap(), b"restored");
}

#[rstest]
#[case::permanent(true)]
#[case::trash(false)]
#[tokio::test(flavor = "multi_thread")]
async fn test_delete_many(#[case] permanent: bool) {
    let fx = Fixture::new();
    let engine = fx.engine();
    let paths = [fx.write("a.log", b"a"), fx.write("b.log.zst", b"b")];

    settle(&engine.delete_many(paths, permanent)).await;

    assert!(fx.names().is_empty());
    assert_eq!(fx.trash.exists(), !permanent);
    if !permanent {
        assert_eq!(std::fs::read_dir(&fx.trash).unwrap().count(), 2);
    }
    assert!(engine.need_refresh());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_trashing_same_names_concurrently_keeps_every_file() {
    let fx = Fixture::new();
    let engine = fx.builder().max_workers(None).build(Handle::current());
    let paths: Vec<_> = (0..8)
        .map(|i| {
            let path = fx.logs.join(format!("app{i}")).join("same.log");
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, format!("file {i}")).unwrap();
            path
        })
        .collect();

    settle(&engine.delete_many(&paths, false)).await;

    assert!(paths.iter().all(|path| !path.exists()));
    let mut trashed: Vec<_> = std::fs::read_dir(&fx.trash)
        .unwrap()
        .map(|entry| std::fs::read_to_string(entry.unwrap().path()).unwrap())
        .collect();
    trashed.sort();
    let expected: Vec<_> = (0..8).map(|i| format!("file {i}")).collect();
    assert_eq!(trashed, expected);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_auto_clean_skips_locked_files() {
    use fs2::FileExt;

    let fx = Fixture::new();
    let engine = fx.engine();
    let busy = fx.write("app_log_20200101.log", b"still being written");
    fx.write("app_log_20200102.log", b"old");
    fx.write("app_log_20200103.log.zst", b"old archive");
    let writer = std::fs::OpenOptions::new().append(true).open(&busy).unwrap();
    FileExt::lock_exclusive(&writer).unwrap();

    settle(&engine.auto_clean(&fx.logs, 7, true).unwrap()).await;

    assert_eq!(fx.names(), ["app_log_20200101.log"]);
    assert_eq!(std::fs::read(&busy).unwrap(), b"still being written");
    assert!(engine.need_refresh());
    drop(writer);
}

#[rstest]
#[case::permanent(true)]
#[case::trash(false)]
#[tokio::test(flavor = "multi_thread")]
async fn test_auto_clean_respects_threshold(#[case] permanent: bool) {
    let fx = Fixture::new();
    let engine = fx.engine();
    fx.write("app_log_20200101.log", b"old raw");
    fx.write("app_log_20200102.log.zst", b"old archive");
    fx.write("misc_dump_20200103.txt", b"old other");
    let fresh = dated_today("app_log", ".log");
    fx.write(&fresh, b"today");

    settle(&engine.auto_clean(&fx.logs, 30, permanent).unwrap()).await;

    assert_eq!(fx.names(), [fresh]);
    let trashed = if fx.trash.exists() { std::fs::read_dir(&fx.trash).unwrap().count() } else { 0 };
    assert_eq!(trashed, if permanent { 0 } else { 3 });
    assert!(engine.need_refresh());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_auto_clean_boundary_is_exclusive() {
    let fx = Fixture::new();
    let engine = fx.engine();
    let fresh = dated_today("app_log", ".log");
    fx.write(&fresh, b"today");

    // Age 0 is not older than a threshold of 0.
    settle(&engine.auto_clean(&fx.logs, 0, true).unwrap()).await;
    assert_eq!(fx.names(), [fresh]);
    assert!(!engine.need_refresh());
}

#[rstest]
#[case::old_enough(7, true)]
#[case::too_young(1_000_000, false)]
#[tokio::test(flavor = "multi_thread")]
async fn test_auto_compress_end_to_end(#[case] threshold: i64, #[case] compressed: bool) {
    let fx = Fixture::new();
    let engine = fx.engine();
    fx.write("app_log_20200101.log", b"2020-01-01 INFO hello\n");

    settle(&engine.auto_compress(&fx.logs, threshold).unwrap()).await;

    let expected = if compressed { "app_log_20200101.log.zst" } else { "app_log_20200101.log" };
    assert_eq!(fx.names(), [expected]);
    assert_eq!(engine.need_refresh(), compressed);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_auto_compress_skips_other_kinds() {
    let fx = Fixture::new();
    let engine = fx.engine();
    fx.write("app_log_20200101.txt", b"other");
    fx.write("app_log_20200102.log.zst", &Zstd::default().compress(b"archived").unwrap());

    settle(&engine.auto_compress(&fx.logs, 7).unwrap()).await;

    assert_eq!(fx.names(), ["app_log_20200101.txt", "app_log_20200102.log.zst"]);
    assert!(!engine.need_refresh());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_auto_policies_report_unreadable_directory() {
    let fx = Fixture::new();
    let engine = fx.engine();
    let missing = fx.logs.join("nope");

    let err = engine.auto_compress(&missing, 7).unwrap_err();
    assert!(matches!(&*err, ErrorKind::Listing(p) if p == &missing));
    let err = engine.auto_clean(&missing, 7, true).unwrap_err();
    assert!(matches!(&*err, ErrorKind::Listing(_)));
    assert!(!engine.is_working());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_wait_idle_covers_independent_batches() {
    let fx = Fixture::new();
    let engine = fx.engine();
    let first = fx.write("a.log", b"a");
    let second = fx.write("b.log", b"b");

    let batches = [engine.compress_one(&first).unwrap(), engine.delete_one(&second, true).unwrap()];
    tokio::time::timeout(TIMEOUT, engine.wait_idle()).await.unwrap();

    assert!(batches.iter().all(Batch::is_done));
    assert_eq!(fx.names(), ["a.log.zst"]);
}
