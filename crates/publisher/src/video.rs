//! TCP video side-channel
//!
//! Each frame is scaled down, JPEG-encoded and sent base64-wrapped as a data
//! URI over a fresh TCP connection that is closed right after the write.
//! Encoding runs on the blocking pool.

use std::io::Cursor;
use std::time::Duration;

use base64::Engine;
use contracts::{ContractError, Frame, VideoConfig, VideoSink};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::RgbImage;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, instrument};

/// Prefix of every payload on the video channel
pub const DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// Scale, JPEG-encode and base64-wrap a frame
pub fn encode_frame(
    frame: &Frame,
    width: u32,
    height: u32,
    quality: u8,
) -> Result<String, ContractError> {
    let img = RgbImage::from_raw(frame.width, frame.height, frame.data.to_vec()).ok_or_else(
        || ContractError::InvalidFrame {
            message: format!("buffer does not match {}x{}", frame.width, frame.height),
        },
    )?;

    let img = if img.dimensions() == (width, height) {
        img
    } else {
        imageops::resize(&img, width, height, FilterType::Triangle)
    };

    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    img.write_with_encoder(encoder)
        .map_err(|e| ContractError::video_send("jpeg", e.to_string()))?;

    let mut payload = String::from(DATA_URI_PREFIX);
    base64::engine::general_purpose::STANDARD.encode_string(buf.into_inner(), &mut payload);
    Ok(payload)
}

/// [`VideoSink`] writing one data URI per TCP connection
#[derive(Debug, Clone)]
pub struct TcpVideoSink {
    name: String,
    addr: String,
    width: u32,
    height: u32,
    quality: u8,
    timeout: Duration,
}

impl TcpVideoSink {
    pub fn new(config: &VideoConfig) -> Self {
        Self {
            name: "tcp-video".to_string(),
            addr: format!("{}:{}", config.host, config.port),
            width: config.width,
            height: config.height,
            quality: config.jpeg_quality,
            timeout: config.send_timeout(),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Encode on a blocking thread so large frames do not stall the runtime
    async fn encode(&self, frame: &Frame) -> Result<String, ContractError> {
        let (frame, width, height, quality) =
            (frame.clone(), self.width, self.height, self.quality);
        tokio::task::spawn_blocking(move || encode_frame(&frame, width, height, quality))
            .await
            .map_err(|e| ContractError::video_send(&self.name, format!("encoder task failed: {e}")))?
    }

    async fn transmit(&self, payload: &[u8]) -> std::io::Result<()> {
        let mut stream = TcpStream::connect(&self.addr).await?;
        stream.write_all(payload).await?;
        stream.shutdown().await?;
        Ok(())
    }
}

impl VideoSink for TcpVideoSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "tcp_video_send",
        skip(self, frame),
        fields(addr = %self.addr, width = frame.width, height = frame.height)
    )]
    async fn send_frame(&mut self, frame: &Frame) -> Result<(), ContractError> {
        let payload = self.encode(frame).await?;

        match tokio::time::timeout(self.timeout, self.transmit(payload.as_bytes())).await {
            Ok(Ok(())) => {
                debug!(bytes = payload.len(), "frame sent");
                Ok(())
            }
            Ok(Err(e)) => Err(ContractError::video_send(&self.name, e.to_string())),
            Err(_) => Err(ContractError::video_send(
                &self.name,
                format!("send timed out after {}ms", self.timeout.as_millis()),
            )),
        }
    }
}
