//! # Loader
//!
//! Fetches raw configuration documents from a file, an HTTP(S) URL or the standard output of a
//! shell command, then decodes, template-expands and parses them into YAML values.
//!
//! Every source is fetched at most once per run: results are memoized in a [`LoadCache`] owned
//! by the `Loader` instance (never a global). Command sources may additionally be persisted
//! across runs in the on-disk [`EvalCache`] when the document asks for a `cache` TTL.
use crate::{
    core::{cache::EvalCache, text},
    errors::MenuError,
    system::executor,
};
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde_yaml::Value;
use std::{
    collections::HashMap,
    fmt,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    time::Duration,
};

lazy_static! {
    static ref URL_PATTERN: Regex = Regex::new(r"^https?://").expect("URL pattern is valid");
}

/// Whether `source` looks like an HTTP(S) URL rather than a file path.
pub fn is_url(source: &str) -> bool {
    URL_PATTERN.is_match(source)
}

/// What a source identifier denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// A file path or an HTTP(S) URL.
    Document,
    /// A shell command line whose standard output is the document.
    Command,
}

/// Per-run memo of parsed sources, keyed by kind and normalized identifier.
#[derive(Debug, Default, Clone)]
pub struct LoadCache {
    entries: HashMap<(SourceKind, String), Value>,
}

impl LoadCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: SourceKind, source: &str) -> Option<&Value> {
        self.entries.get(&(kind, source.to_string()))
    }

    pub fn insert(&mut self, kind: SourceKind, source: String, data: Value) {
        self.entries.insert((kind, source), data);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct Loader {
    work_dir: Option<PathBuf>,
    encoding: String,
    output: Box<dyn Write>,
    cache: LoadCache,
    eval_cache: EvalCache,
    clear_cache: bool,
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("work_dir", &self.work_dir)
            .field("encoding", &self.encoding)
            .field("cache_entries", &self.cache.len())
            .field("eval_cache", &self.eval_cache)
            .field("clear_cache", &self.clear_cache)
            .finish()
    }
}

impl Loader {
    /// Creates a loader with an empty per-run cache that reports progress on stdout.
    pub fn new(
        work_dir: Option<PathBuf>,
        encoding: impl Into<String>,
        eval_cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            work_dir,
            encoding: encoding.into(),
            output: Box::new(io::stdout()),
            cache: LoadCache::new(),
            eval_cache: EvalCache::new(eval_cache_dir),
            clear_cache: false,
        }
    }

    /// Redirects the "Reading file: ..." style progress notices.
    pub fn with_output(mut self, output: Box<dyn Write>) -> Self {
        self.output = output;
        self
    }

    /// Ignores (and refreshes) existing eval-cache entries.
    pub fn with_clear_cache(mut self, clear_cache: bool) -> Self {
        self.clear_cache = clear_cache;
        self
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn cache(&self) -> &LoadCache {
        &self.cache
    }

    /// Loads one source and returns its parsed YAML value.
    ///
    /// Relative file paths are resolved against the work directory; URLs and command lines are
    /// used verbatim. `eval_ttl` only applies to [`SourceKind::Command`] sources.
    ///
    /// # Errors
    /// `MenuError::Config` for unreadable sources, template errors and YAML syntax errors;
    /// `MenuError::Encoding` when the bytes decode neither with the configured encoding nor UTF-8.
    pub fn load(
        &mut self,
        kind: SourceKind,
        source: &str,
        eval_ttl: Option<Duration>,
    ) -> Result<Value, MenuError> {
        if source.trim().is_empty() {
            return Err(MenuError::config(source, "Empty source."));
        }
        let source = self.normalize(kind, source);

        if let Some(data) = self.cache.get(kind, &source) {
            debug!("Load cache hit: {:?} {}", kind, source);
            return Ok(data.clone());
        }

        let bytes = self.fetch(kind, &source, eval_ttl)?;
        let decoded =
            text::decode_with_fallback(&bytes, &self.encoding).ok_or_else(|| MenuError::Encoding {
                encoding: self.encoding.clone(),
                path: source.clone(),
            })?;
        let rendered = render_template(&decoded)
            .map_err(|e| MenuError::config(&source, format!("Template error: {}", e)))?;
        let data: Value = serde_yaml::from_str(&rendered)
            .map_err(|e| MenuError::config(&source, format!("YAML format error: {}", e)))?;

        self.cache.insert(kind, source, data.clone());
        Ok(data)
    }

    fn normalize(&self, kind: SourceKind, source: &str) -> String {
        if kind == SourceKind::Command || is_url(source) {
            return source.to_string();
        }
        match &self.work_dir {
            Some(work_dir) if Path::new(source).is_relative() => {
                let joined = work_dir.join(source);
                debug!("Normalized '{}' to '{}'", source, joined.display());
                joined.to_string_lossy().into_owned()
            }
            _ => source.to_string(),
        }
    }

    fn fetch(
        &mut self,
        kind: SourceKind,
        source: &str,
        eval_ttl: Option<Duration>,
    ) -> Result<Vec<u8>, MenuError> {
        match kind {
            SourceKind::Command => self.fetch_command(source, eval_ttl),
            SourceKind::Document if is_url(source) => {
                self.notice(&format!(t!("loader.notice.reading_url"), url = source));
                fetch_url(source)
                    .map_err(|e| MenuError::config(source, format!("Failed to open: {}", e)))
            }
            SourceKind::Document => {
                self.notice(&format!(t!("loader.notice.reading_file"), path = source));
                fs::read(source)
                    .map_err(|e| MenuError::config(source, format!("Failed to open: {}", e)))
            }
        }
    }

    fn fetch_command(
        &mut self,
        command_line: &str,
        eval_ttl: Option<Duration>,
    ) -> Result<Vec<u8>, MenuError> {
        if let Some(ttl) = eval_ttl {
            if !self.clear_cache {
                if let Some(bytes) = self.eval_cache.read_fresh(command_line, ttl) {
                    return Ok(bytes);
                }
            }
        }

        self.notice(&format!(t!("loader.notice.executing"), cmd = command_line));
        let bytes = executor::capture_output(command_line, &self.encoding, self.work_dir.as_deref())
            .map_err(|e| MenuError::config(command_line, format!("Failed to open: {}", e)))?;

        if eval_ttl.is_some() {
            if let Err(e) = self.eval_cache.store(command_line, &bytes) {
                log::warn!(
                    "Could not write eval cache entry for '{}': {}",
                    command_line,
                    e
                );
            }
        }
        Ok(bytes)
    }

    fn notice(&mut self, message: &str) {
        if let Err(e) = writeln!(self.output, "{}", message) {
            log::warn!("Could not write progress notice: {}", e);
        }
    }
}

fn fetch_url(url: &str) -> Result<Vec<u8>, reqwest::Error> {
    let response = reqwest::blocking::get(url)?.error_for_status()?;
    Ok(response.bytes()?.to_vec())
}

/// Expands the document as a self-contained template: no variables are injected, but the
/// document may define and use its own (`{% set %}`, loops, filters).
fn render_template(source: &str) -> Result<String, minijinja::Error> {
    let env = minijinja::Environment::new();
    env.render_str(source, minijinja::context! {})
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::SystemTime;
    use tempfile::{TempDir, tempdir};

    fn loader_in(dir: &TempDir) -> Loader {
        Loader::new(Some(dir.path().to_path_buf()), "utf-8", dir.path().join("eval"))
            .with_output(Box::new(io::sink()))
    }

    fn count_lines(path: &Path) -> usize {
        fs::read_to_string(path).map(|s| s.lines().count()).unwrap_or(0)
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("http://example.com/menu.yml"));
        assert!(is_url("https://example.com/menu.yml"));
        assert!(!is_url("ftp://example.com/menu.yml"));
        assert!(!is_url("/etc/easy-menu.yml"));
        assert!(!is_url("menu.yml"));
        assert!(!is_url(" https://leading-space"));
    }

    #[test]
    fn test_load_relative_file_against_work_dir() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("menu.yml"), "Main:\n  - Task: echo 1\n").unwrap();
        let mut loader = loader_in(&dir);
        assert!(loader.cache().is_empty());

        let data = loader.load(SourceKind::Document, "menu.yml", None).unwrap();

        assert_eq!(data["Main"][0]["Task"].as_str(), Some("echo 1"));
        assert!(!loader.cache().is_empty());
        let normalized = dir.path().join("menu.yml").to_string_lossy().into_owned();
        assert!(loader.cache().get(SourceKind::Document, &normalized).is_some());
    }

    #[test]
    fn test_progress_notice_is_written() {
        #[derive(Clone, Default)]
        struct Shared(std::rc::Rc<std::cell::RefCell<Vec<u8>>>);
        impl Write for Shared {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.borrow_mut().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let dir = tempdir().unwrap();
        let path = dir.path().join("menu.yml");
        fs::write(&path, "Main: []\n").unwrap();
        let sink = Shared::default();
        let mut loader = loader_in(&dir).with_output(Box::new(sink.clone()));

        loader
            .load(SourceKind::Document, path.to_str().unwrap(), None)
            .unwrap();

        let written = String::from_utf8(sink.0.borrow().clone()).unwrap();
        assert!(written.contains(path.to_str().unwrap()));
    }

    /// Serves `body` to exactly one HTTP client on a loopback port and returns the base URL.
    fn serve_once(body: &'static str) -> (String, std::thread::JoinHandle<()>) {
        use std::io::{BufRead, BufReader};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap() > 0 && line != "\r\n" {
                line.clear();
            }
            let mut stream = reader.into_inner();
            write!(
                stream,
                "HTTP/1.0 200 OK\r\nContent-Type: text/yaml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            )
            .unwrap();
        });
        (url, handle)
    }

    #[test]
    fn test_load_url_is_fetched_once_and_not_normalized() {
        #[derive(Clone, Default)]
        struct Shared(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);
        impl Write for Shared {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let dir = tempdir().unwrap();
        let (base, server) = serve_once("Remote:\n  - Hello: echo remote\n");
        let url = format!("{}/menu.yml", base);
        let sink = Shared::default();
        let mut loader = loader_in(&dir).with_output(Box::new(sink.clone()));

        let data = loader.load(SourceKind::Document, &url, None).unwrap();
        server.join().unwrap();

        assert_eq!(data["Remote"][0]["Hello"].as_str(), Some("echo remote"));
        // The URL is the cache key as given, not joined onto the work directory.
        assert!(loader.cache().get(SourceKind::Document, &url).is_some());
        let written = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
        assert!(written.contains(&url));

        // The server is gone; a second load must come from the per-run cache.
        let again = loader.load(SourceKind::Document, &url, None).unwrap();
        assert_eq!(again, data);
        assert_eq!(loader.cache().len(), 1);
    }

    #[test]
    fn test_unreachable_url_is_config_error() {
        let dir = tempdir().unwrap();
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/menu.yml", listener.local_addr().unwrap());
        drop(listener);

        let err = loader_in(&dir)
            .load(SourceKind::Document, &url, None)
            .unwrap_err();

        assert!(matches!(err, MenuError::Config { ref path, .. } if *path == url));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempdir().unwrap();
        let mut loader = loader_in(&dir);

        let err = loader
            .load(SourceKind::Document, "nope.yml", None)
            .unwrap_err();

        match err {
            MenuError::Config { path, message } => {
                assert!(path.ends_with("nope.yml"));
                assert!(message.starts_with("Failed to open"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_yaml_syntax_error_names_source_and_position() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("bad.yml"), "Main:\n  - [unclosed\n").unwrap();
        let mut loader = loader_in(&dir);

        let err = loader.load(SourceKind::Document, "bad.yml", None).unwrap_err();

        let text = err.to_string();
        assert!(text.contains("bad.yml"));
        assert!(text.contains("YAML format error"));
        assert!(text.contains("line"));
    }

    #[test]
    fn test_template_is_expanded_without_context() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("menu.yml"),
            "{% set greeting = 'hello' %}Main:\n{% for i in range(2) %}  - Task {{ i }}: echo {{ greeting }}\n{% endfor %}",
        )
        .unwrap();
        let mut loader = loader_in(&dir);

        let data = loader.load(SourceKind::Document, "menu.yml", None).unwrap();

        assert_eq!(data["Main"][0]["Task 0"].as_str(), Some("echo hello"));
        assert_eq!(data["Main"][1]["Task 1"].as_str(), Some("echo hello"));
    }

    #[test]
    fn test_configured_encoding_and_fallback() {
        let dir = tempdir().unwrap();
        // "Main: [あ]" in Shift_JIS.
        let sjis: &[u8] = &[b'M', b'a', b'i', b'n', b':', b' ', b'[', 0x82, 0xa0, b']'];
        fs::write(dir.path().join("sjis.yml"), sjis).unwrap();

        let mut loader = Loader::new(
            Some(dir.path().to_path_buf()),
            "shift_jis",
            dir.path().join("eval"),
        )
        .with_output(Box::new(io::sink()));
        let data = loader.load(SourceKind::Document, "sjis.yml", None).unwrap();
        assert_eq!(data["Main"][0].as_str(), Some("あ"));

        let mut utf8_loader = loader_in(&dir);
        let err = utf8_loader
            .load(SourceKind::Document, "sjis.yml", None)
            .unwrap_err();
        assert!(matches!(err, MenuError::Encoding { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_source_runs_once_per_run() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("menu.yml"), "Main: []\n").unwrap();
        let cmd = "echo run >> count.txt; cat menu.yml";
        let mut loader = loader_in(&dir);

        let first = loader.load(SourceKind::Command, cmd, None).unwrap();
        let second = loader.load(SourceKind::Command, cmd, None).unwrap();

        assert_eq!(first, second);
        assert_eq!(count_lines(&dir.path().join("count.txt")), 1);
        assert_eq!(loader.cache().len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_same_text_as_file_and_command_are_distinct_sources() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("menu.yml"), "Main: []\n").unwrap();
        let mut loader = loader_in(&dir);

        loader.load(SourceKind::Document, "menu.yml", None).unwrap();
        let result = loader.load(SourceKind::Command, "menu.yml", None);

        // `menu.yml` as a shell command prints nothing useful, but it is a separate entry.
        assert!(result.is_ok());
        assert_eq!(loader.cache().len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_eval_cache_serves_fresh_entries_across_runs() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("menu.yml"), "Main: []\n").unwrap();
        let counter = dir.path().join("count.txt");
        let cmd = "echo run >> count.txt; cat menu.yml";
        let ttl = Some(Duration::from_secs(3600));

        loader_in(&dir).load(SourceKind::Command, cmd, ttl).unwrap();
        assert_eq!(count_lines(&counter), 1);

        // A new run with a fresh per-run cache reuses the on-disk entry.
        let data = loader_in(&dir).load(SourceKind::Command, cmd, ttl).unwrap();
        assert_eq!(count_lines(&counter), 1);
        assert!(data["Main"].as_sequence().unwrap().is_empty());

        // Without a TTL the disk cache is bypassed.
        loader_in(&dir).load(SourceKind::Command, cmd, None).unwrap();
        assert_eq!(count_lines(&counter), 2);

        // clear_cache forces a re-run.
        loader_in(&dir)
            .with_clear_cache(true)
            .load(SourceKind::Command, cmd, ttl)
            .unwrap();
        assert_eq!(count_lines(&counter), 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_expired_eval_cache_entry_is_refreshed() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("menu.yml"), "Main: []\n").unwrap();
        let counter = dir.path().join("count.txt");
        let cmd = "echo run >> count.txt; cat menu.yml";
        let ttl = Some(Duration::from_secs(60));

        loader_in(&dir).load(SourceKind::Command, cmd, ttl).unwrap();
        let entry = EvalCache::new(dir.path().join("eval")).entry_path(cmd);
        File::options()
            .write(true)
            .open(&entry)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(120))
            .unwrap();

        loader_in(&dir).load(SourceKind::Command, cmd, ttl).unwrap();

        assert_eq!(count_lines(&counter), 2);
        let age = SystemTime::now()
            .duration_since(fs::metadata(&entry).unwrap().modified().unwrap())
            .unwrap_or_default();
        assert!(age < Duration::from_secs(60));
    }

    #[test]
    fn test_empty_source_is_rejected() {
        let dir = tempdir().unwrap();
        let err = loader_in(&dir)
            .load(SourceKind::Document, "  ", None)
            .unwrap_err();
        assert!(matches!(err, MenuError::Config { .. }));
    }
}
