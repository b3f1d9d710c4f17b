//! 코퍼스 수집 모듈
//!
//! 로컬 지식베이스 폴더에서 텍스트 문서를 수집합니다.
//! .gitignore 패턴을 존중하고, 지원하는 확장자만 수집합니다.

use std::io;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

// ============================================================================
// Collector Config
// ============================================================================

/// 수집기 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 최대 파일 크기 (바이트, 0이면 제한 없음)
    pub max_file_size: u64,
    /// 수집 대상 확장자 (소문자)
    pub extensions: Vec<String>,
    /// 파일명에 포함되면 제외하는 패턴 (소문자 부분 일치)
    pub deny_patterns: Vec<String>,
    /// .gitignore 패턴 존중 여부
    pub respect_gitignore: bool,
    /// 숨김 파일 포함 여부
    pub include_hidden: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_file_size: 1024 * 1024, // 1MB
            extensions: vec!["txt".into(), "md".into(), "markdown".into()],
            deny_patterns: vec![],
            respect_gitignore: true,
            include_hidden: false,
        }
    }
}

// ============================================================================
// Corpus File
// ============================================================================

/// 수집된 코퍼스 문서
#[derive(Debug, Clone)]
pub struct CorpusFile {
    /// 파일명 (경로 제외) - 청크의 source로 사용
    pub filename: String,
    /// 파일 절대 경로
    pub path: PathBuf,
    /// 파일 전체 내용 (UTF-8)
    pub content: String,
}

// ============================================================================
// Corpus Collector
// ============================================================================

/// 코퍼스 수집기
///
/// 개별 파일의 읽기 실패는 경고 로그 후 건너뛰며,
/// 결과는 경로순으로 정렬되어 결정적입니다.
pub struct CorpusCollector {
    config: CollectorConfig,
}

impl CorpusCollector {
    pub fn new(config: CollectorConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(CollectorConfig::default())
    }

    /// 폴더를 재귀적으로 수집
    pub fn collect(&self, dir: &Path) -> io::Result<Vec<CorpusFile>> {
        if !dir.exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("corpus directory not found: {:?}", dir),
            ));
        }
        if !dir.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a directory: {:?}", dir),
            ));
        }

        let walker = WalkBuilder::new(dir)
            .hidden(!self.config.include_hidden)
            .git_ignore(self.config.respect_gitignore)
            .git_global(self.config.respect_gitignore)
            .git_exclude(self.config.respect_gitignore)
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Failed to read entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }

            let path = entry.path();
            if !self.should_include(path) {
                continue;
            }

            match std::fs::read_to_string(path) {
                Ok(content) => {
                    let filename = path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default();
                    files.push(CorpusFile {
                        filename,
                        path: path.to_path_buf(),
                        content,
                    });
                }
                Err(e) => {
                    tracing::warn!("Skipping unreadable file {:?}: {}", path, e);
                }
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::info!("Collected {} documents from {:?}", files.len(), dir);
        Ok(files)
    }

    /// 확장자, 크기, 제외 패턴 필터
    fn should_include(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        if !self
            .config
            .extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(ext))
        {
            return false;
        }

        if !self.config.deny_patterns.is_empty() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            if self.config.deny_patterns.iter().any(|p| name.contains(p)) {
                tracing::debug!("Denied by pattern: {:?}", path);
                return false;
            }
        }

        if self.config.max_file_size > 0 {
            let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
            if size > self.config.max_file_size {
                tracing::debug!("Skipping large file: {:?} ({} bytes)", path, size);
                return false;
            }
        }

        true
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_collects_supported_extensions_sorted() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "b-notes.md", "markdown body");
        write(tmp.path(), "a-guide.txt", "text body");
        write(tmp.path(), "image.png", "binary-ish");
        write(tmp.path(), "data.json", "{}");

        let files = CorpusCollector::with_defaults().collect(tmp.path()).unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["a-guide.txt", "b-notes.md"]);
        assert_eq!(files[0].content, "text body");
    }

    #[test]
    fn test_recurses_into_subdirectories() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("nested")).unwrap();
        write(tmp.path(), "top.txt", "top");
        write(&tmp.path().join("nested"), "deep.md", "deep");

        let files = CorpusCollector::with_defaults().collect(tmp.path()).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_deny_patterns_exclude_by_filename() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "guide.txt", "keep");
        write(tmp.path(), "draft-guide.txt", "drop");

        let config = CollectorConfig {
            deny_patterns: vec!["draft".into()],
            ..Default::default()
        };
        let files = CorpusCollector::new(config).collect(tmp.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "guide.txt");
    }

    #[test]
    fn test_max_file_size_skips_large_files() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "small.txt", "ok");
        write(tmp.path(), "large.txt", &"x".repeat(200));

        let config = CollectorConfig {
            max_file_size: 100,
            ..Default::default()
        };
        let files = CorpusCollector::new(config).collect(tmp.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "small.txt");
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        let err = CorpusCollector::with_defaults().collect(&missing);
        assert!(err.is_err());
    }
}
