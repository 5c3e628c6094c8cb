//! 파일 기반 로그 수집기
//!
//! 인증 로그 파일 끝에서 시작하여 이후에 추가된 바이트만 읽습니다.
//! `tail -f`와 유사한 동작을 pull 방식으로 제공합니다.
//!
//! 로테이션/truncation은 감지하지 않습니다. 파일이 줄어들면 다음 읽기는
//! 새 데이터 없이 반환됩니다.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::BytesMut;
use intrusion_monitor_core::config::WatchdogConfig;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::sync::CancellationToken;

use crate::error::TailerError;

/// 한 번의 폴링에서 읽을 최대 바이트 수
const MAX_READ_CHUNK_BYTES: u64 = 8 * 1024 * 1024; // 8 MiB

/// 시작 진단을 위해 파일 끝에서 읽는 최대 바이트 수
const STARTUP_TAIL_WINDOW_BYTES: u64 = 64 * 1024; // 64KB

/// 파일 수집기 설정
#[derive(Debug, Clone)]
pub struct TailerConfig {
    /// 새 데이터가 없을 때 대기 간격 (밀리초)
    pub poll_interval_ms: u64,
    /// 최대 라인 길이 (바이트). 개행 없이 이 길이를 넘으면 강제로 잘라냅니다.
    pub max_line_length: usize,
    /// 시작 시 debug 로그로 출력할 기존 라인 수
    pub startup_tail_lines: usize,
}

impl Default for TailerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            max_line_length: 64 * 1024, // 64KB
            startup_tail_lines: 5,
        }
    }
}

impl TailerConfig {
    /// core의 `WatchdogConfig`에서 수집기 설정을 생성합니다.
    pub fn from_core(core: &WatchdogConfig) -> Self {
        Self {
            poll_interval_ms: core.poll_interval_ms,
            max_line_length: core.max_line_length,
            startup_tail_lines: core.startup_tail_lines,
        }
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// 추가 전용 로그 파일 수집기
///
/// 열린 파일 핸들과 읽기 위치를 단독으로 소유합니다.
pub struct FileTailer {
    /// 감시 중인 파일 경로
    path: PathBuf,
    /// 열린 파일 (현재 위치 = 마지막 읽기 위치)
    file: File,
    /// 수집기 설정
    config: TailerConfig,
    /// 아직 개행을 만나지 못한 마지막 부분 라인
    pending: BytesMut,
}

impl FileTailer {
    /// 파일을 열고 끝으로 이동합니다.
    ///
    /// 파일이 없으면 [`TailerError::NotFound`], 읽을 수 없으면
    /// [`TailerError::PermissionDenied`]를 반환합니다.
    pub async fn open(path: impl AsRef<Path>, config: TailerConfig) -> Result<Self, TailerError> {
        let path = path.as_ref().to_path_buf();
        let display = path.display().to_string();

        let mut file = File::open(&path)
            .await
            .map_err(|e| TailerError::from_io(display.clone(), e))?;

        if config.startup_tail_lines > 0 {
            log_last_lines(&mut file, &display, config.startup_tail_lines).await;
        }

        let offset = file
            .seek(SeekFrom::End(0))
            .await
            .map_err(|e| TailerError::from_io(display.clone(), e))?;

        tracing::info!(path = %path.display(), offset, "listening for new lines");

        Ok(Self {
            path,
            file,
            config,
            pending: BytesMut::new(),
        })
    }

    /// 감시 중인 파일 경로를 반환합니다.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 다음 라인 배치를 기다립니다.
    ///
    /// 새로 추가된 완전한 라인(개행으로 끝남)이 하나 이상 생길 때까지
    /// `poll_interval_ms` 간격으로 폴링합니다. 빈 라인은 걸러집니다.
    /// 취소 토큰이 발동하면 `Ok(None)`을 반환합니다.
    pub async fn next_batch(
        &mut self,
        shutdown: &CancellationToken,
    ) -> Result<Option<Vec<String>>, TailerError> {
        loop {
            if shutdown.is_cancelled() {
                return Ok(None);
            }

            let lines = self.read_new_lines().await?;
            if !lines.is_empty() {
                tracing::debug!(count = lines.len(), "new lines found");
                return Ok(Some(lines));
            }

            tracing::trace!(
                poll_interval_ms = self.config.poll_interval_ms,
                "no new lines, sleeping"
            );
            if sleep_or_cancel(self.config.poll_interval(), shutdown).await {
                return Ok(None);
            }
        }
    }

    /// 마지막 읽기 위치 이후의 바이트를 읽어 완전한 라인으로 나눕니다.
    async fn read_new_lines(&mut self) -> Result<Vec<String>, TailerError> {
        let mut total = 0u64;
        loop {
            let mut limited = (&mut self.file).take(MAX_READ_CHUNK_BYTES - total);
            let n = limited
                .read_buf(&mut self.pending)
                .await
                .map_err(|e| TailerError::from_io(self.path.display().to_string(), e))?;
            if n == 0 {
                break;
            }
            total += n as u64;
            if total >= MAX_READ_CHUNK_BYTES {
                break;
            }
        }

        Ok(self.drain_complete_lines())
    }

    /// 버퍼에서 개행으로 끝나는 라인을 모두 꺼냅니다.
    fn drain_complete_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();

        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw = self.pending.split_to(pos + 1);
            push_line(&mut lines, &raw);
        }

        if self.pending.len() > self.config.max_line_length {
            tracing::warn!(
                path = %self.path.display(),
                size = self.pending.len(),
                max = self.config.max_line_length,
                "partial line exceeds max length, flushing without newline"
            );
            let raw = self.pending.split();
            push_line(&mut lines, &raw);
        }

        lines
    }
}

/// 라인 종결자를 제거하고, 내용이 있으면 목록에 추가합니다.
fn push_line(lines: &mut Vec<String>, raw: &[u8]) {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim_end_matches(['\n', '\r']);
    if !text.is_empty() {
        lines.push(text.to_owned());
    }
}

/// 취소되면 `true`를 반환합니다.
async fn sleep_or_cancel(duration: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}

/// 파일의 마지막 몇 줄을 debug 로그로 남깁니다. 실패는 무시합니다.
async fn log_last_lines(file: &mut File, path: &str, count: usize) {
    let result: std::io::Result<Vec<u8>> = async {
        let len = file.metadata().await?.len();
        file.seek(SeekFrom::Start(len.saturating_sub(STARTUP_TAIL_WINDOW_BYTES)))
            .await?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).await?;
        Ok(buf)
    }
    .await;

    match result {
        Ok(buf) => {
            let text = String::from_utf8_lossy(&buf);
            let lines: Vec<&str> = text.lines().filter(|l| !l.is_empty()).collect();
            let tail = &lines[lines.len().saturating_sub(count)..];
            tracing::debug!(path, lines = ?tail, "last lines of the log file");
        }
        Err(e) => tracing::debug!(path, error = %e, "could not read existing log lines"),
    }
}
