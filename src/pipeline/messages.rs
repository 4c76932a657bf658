//! Texts shown to the requester

pub const ACKNOWLEDGE: &str = "Processing your request...";

/// Base text of the animated status line; the ticker appends one to three dots
pub const PROCESSING_FRAME: &str = "Processing your request";

pub const INVALID_URL: &str = "❌ **Invalid URL!** Please provide a valid video link.";

pub const UPSTREAM_FAILED: &str = "❌ Something went wrong. **Check the URL again!**";

pub const DOWNLOAD_FAILED: &str = "❌ **Error during downloading the video.** Try again!";

pub const AUDIO_ONLY: &str =
    "❌ This link only returned audio. **The video is probably private or restricted.**";

pub const COMPRESSING: &str = "🚨 **The video is too large!** Compressing...";

pub const TRANSCODE_TIMEOUT: &str =
    "❌ Compression took too long. **The video is probably too large to compress.**";

pub const TRANSCODE_FAILED: &str =
    "❌ Error during video compression. **The compressed file is probably too large to send.**";

pub const DELIVERY_FAILED: &str = "❌ **Could not send the video.** Try again!";

pub const READY: &str = "Your video is ready!";
