use std::time::Duration;

pub struct Utils {

}

impl Utils {
    /// "1h 02m 03s", "4m 05s" or "7s"
    pub fn format_elapsed(elapsed: Duration) -> String {
        let secs = elapsed.as_secs();
        let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
        if hours > 0 {
            format!("{}h {:02}m {:02}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {:02}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}
