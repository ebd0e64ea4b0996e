//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which builds a full [`AppState`] over an
//! in-memory database, a temporary data directory and [`FakeEngine`], and
//! can serve it on a random port for HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use trackwave::config::Config;
use trackwave::server::{self, AppState};
use trackwave_av::{EncodeParams, ProbeInfo, SegmentSet, TranscodeEngine};
use trackwave_db::pool::init_memory_pool;
use trackwave_db::SqliteMetadataStore;
use trackwave_media::FrameHeader;

/// Upload prefix that makes [`FakeEngine::probe`] report no audio.
pub const NO_AUDIO: &[u8] = b"NO_AUDIO";
/// Upload prefix that makes the segment encode fail.
pub const FAIL_SEGMENTS: &[u8] = b"FAIL_SEGMENTS";
/// Upload prefix that makes the bitstream encode fail.
pub const FAIL_BITSTREAM: &[u8] = b"FAIL_BITSTREAM";
/// Upload prefix that makes the bitstream encode write bytes without frames.
pub const GARBAGE_BITSTREAM: &[u8] = b"GARBAGE_BITSTREAM";
/// Upload prefix that makes the bitstream encode write a variable bitrate.
pub const VBR_BITSTREAM: &[u8] = b"VBR_BITSTREAM";

/// 128 kbit/s at 44.1 kHz with 1024 samples per frame.
pub const CBR_FRAME_LEN: usize = 371;

/// An ADTS stream of `count` frames of `len` bytes.
pub fn adts_stream(count: usize, len: usize) -> Vec<u8> {
    let mut buf = Vec::with_capacity(count * len);
    for i in 0..count {
        buf.extend_from_slice(&FrameHeader::aac_lc(len as u16).encode());
        buf.resize(buf.len() + len - 7, (i % 200) as u8 & 0x7F);
    }
    buf
}

/// In-process [`TranscodeEngine`] writing synthetic artifacts.
///
/// Behaviour is selected by the upload's leading bytes (see the constants
/// above); anything else succeeds.
pub struct FakeEngine {
    /// Frames in a successful bitstream.
    pub frames: usize,
    pub segments: usize,
}

impl Default for FakeEngine {
    fn default() -> Self {
        // About ten seconds of audio.
        Self {
            frames: 431,
            segments: 10,
        }
    }
}

async fn upload_starts_with(input: &Path, marker: &[u8]) -> bool {
    tokio::fs::read(input)
        .await
        .map(|data| data.starts_with(marker))
        .unwrap_or(false)
}

#[async_trait]
impl TranscodeEngine for FakeEngine {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn probe(&self, input: &Path) -> trackwave_av::Result<ProbeInfo> {
        if upload_starts_with(input, NO_AUDIO).await {
            return Err(trackwave_av::Error::no_audio_stream(input));
        }
        Ok(ProbeInfo {
            container: "mp3".into(),
            codec: "mp3".into(),
            duration: Some(Duration::from_secs_f64(self.frames as f64 * 1024.0 / 44_100.0)),
            bitrate: Some(192_000),
            sample_rate: Some(44_100),
            channels: Some(2),
        })
    }

    async fn encode_to_segments(
        &self,
        input: &Path,
        out_dir: &Path,
        _params: &EncodeParams,
    ) -> trackwave_av::Result<SegmentSet> {
        if upload_starts_with(input, FAIL_SEGMENTS).await {
            return Err(trackwave_av::Error::tool_failed("fake", "segmenter crashed"));
        }

        let mut playlist = String::from(
            "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:1\n#EXT-X-MEDIA-SEQUENCE:0\n",
        );
        for n in 0..self.segments {
            playlist.push_str(&format!("#EXTINF:1.000000,\nsegment{n}.ts\n"));
            tokio::fs::write(out_dir.join(format!("segment{n}.ts")), vec![0x47u8; 188 * 4])
                .await?;
        }
        playlist.push_str("#EXT-X-ENDLIST\n");
        tokio::fs::write(out_dir.join("playlist.m3u8"), playlist).await?;

        SegmentSet::scan(out_dir)
    }

    async fn encode_to_framed_bitstream(
        &self,
        input: &Path,
        output: &Path,
        _params: &EncodeParams,
    ) -> trackwave_av::Result<()> {
        let data = if upload_starts_with(input, FAIL_BITSTREAM).await {
            return Err(trackwave_av::Error::tool_failed("fake", "encoder exited with 1"));
        } else if upload_starts_with(input, GARBAGE_BITSTREAM).await {
            vec![0u8; 4096]
        } else if upload_starts_with(input, VBR_BITSTREAM).await {
            let mut data = adts_stream(self.frames, 120);
            data.extend(adts_stream(self.frames, 704));
            data
        } else {
            adts_stream(self.frames, CBR_FRAME_LEN)
        };
        tokio::fs::write(output, data).await?;
        Ok(())
    }
}

/// Test harness wrapping a fully-constructed [`AppState`].
pub struct TestHarness {
    pub state: AppState,
    pub store: SqliteMetadataStore,
    /// Data directory; removed when the harness is dropped.
    pub dir: TempDir,
}

impl TestHarness {
    /// Create a new harness with default configuration.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a harness, letting the caller adjust the configuration.
    pub fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        Self::with_engine(adjust, FakeEngine::default())
    }

    pub fn with_engine(adjust: impl FnOnce(&mut Config), engine: FakeEngine) -> Self {
        let dir = tempfile::tempdir().expect("failed to create data dir");
        let mut config = Config::default();
        config.storage.data_dir = dir.path().to_path_buf();
        adjust(&mut config);

        let store =
            SqliteMetadataStore::new(init_memory_pool().expect("failed to create in-memory pool"));
        let state = AppState::new(config, store.clone(), Arc::new(engine));

        Self { state, store, dir }
    }

    /// Serve the harness on a random port.
    pub async fn serve(&self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        let state = self.state.clone();
        tokio::spawn(async move {
            server::serve(listener, state, std::future::pending())
                .await
                .ok();
        });

        addr
    }

    /// Start a harness with default config and serve it.
    pub async fn with_server() -> (Self, SocketAddr) {
        let harness = Self::new();
        let addr = harness.serve().await;
        (harness, addr)
    }
}

/// Upload `body` over HTTP as `owner`.
pub async fn upload(
    addr: SocketAddr,
    owner: &str,
    title: &str,
    body: Vec<u8>,
) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("http://{addr}/api/tracks"))
        .query(&[("owner", owner), ("artist", "Test Artist"), ("title", title)])
        .body(body)
        .send()
        .await
        .expect("upload request failed")
}

/// Upload a successful track and return its id.
pub async fn upload_ok(addr: SocketAddr, owner: &str) -> i64 {
    let response = upload(addr, owner, "Song", b"audio bytes".to_vec()).await;
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);
    let body: serde_json::Value = response.json().await.unwrap();
    body["id"].as_i64().expect("track id in response")
}
