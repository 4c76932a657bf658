use url::Url;

/// Format file size in human-readable format
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log10() / THRESHOLD.log10()).floor() as usize;
    let unit_index = unit_index.min(UNITS.len() - 1);

    let size = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Extract domain from URL for display purposes
pub fn extract_domain(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .host_str()
        .map(|host| host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// Check that the media tools the pipeline shells out to are installed
pub async fn check_dependencies(ffmpeg_path: &str, ffprobe_path: &str) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(ffmpeg_path).await {
        missing.push(format!("{} - required to compress large videos", ffmpeg_path));
    }

    if !check_command_available(ffprobe_path).await {
        missing.push(format!("{} - required to inspect downloaded videos", ffprobe_path));
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg("-version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(8 * 1024 * 1024), "8.0 MB");
        assert_eq!(format_file_size(12_582_912), "12.0 MB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30.0), "30s");
        assert_eq!(format_duration(90.0), "1m 30s");
        assert_eq!(format_duration(3661.0), "1h 1m 1s");
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://www.instagram.com/reel/abc/"),
            Some("instagram.com".to_string())
        );
        assert_eq!(
            extract_domain("https://facebook.com/watch/?v=1"),
            Some("facebook.com".to_string())
        );
        assert_eq!(extract_domain("invalid-url"), None);
    }

    #[tokio::test]
    async fn test_missing_tools_are_reported() {
        let missing = check_dependencies("/nonexistent/ffmpeg", "/nonexistent/ffprobe").await;
        assert_eq!(missing.len(), 2);
        assert!(missing[0].contains("ffmpeg"));
    }
}
