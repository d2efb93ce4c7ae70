use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

static DAYS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"قبل (\d+) (يوم|أيام)").unwrap());
static HOURS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"قبل (\d+) ساع").unwrap());

/// Which band of elapsed-time-since-posting a category accepts. The site only
/// exposes fuzzy relative phrases ("قبل ساعة", "أمس", "قبل 3 أيام"), so the
/// window is decided from marker text, not from a parsed timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecencyWindow {
    /// Anything posted within the last ~24 hours is accepted.
    SameDay,
    /// Only the 24-48 hour band is accepted; fresher posts are left for the
    /// next run so a day is never captured twice.
    StrictYesterday,
}

impl RecencyWindow {
    pub fn label(&self) -> &'static str {
        match self {
            RecencyWindow::SameDay => "same-day",
            RecencyWindow::StrictYesterday => "strict-yesterday",
        }
    }

    /// Decide whether a posted-at phrase falls inside this window.
    ///
    /// Checks run in priority order because the phrases overlap as substrings:
    /// the dual "يومين" (two days) contains the single-day marker "يوم", and a
    /// digit-days phrase must win over any hour pattern it happens to contain.
    /// Unrecognized text is always out-of-window.
    pub fn is_in_window(&self, posted_at: &str) -> bool {
        let posted_at = posted_at.trim();
        if posted_at.is_empty() {
            return false;
        }

        // "أمس" (yesterday)
        if posted_at.contains("أمس") {
            return true;
        }

        // "يومين" (two days, dual form) — before the bare single-day marker,
        // which is a substring of it
        if posted_at.contains("يومين") {
            return false;
        }

        // "قبل يوم" / "قبل 1 يوم" (one day ago)
        if posted_at.contains("قبل يوم") || posted_at.contains("قبل 1 يوم") {
            return true;
        }

        // "قبل N يوم/أيام" — N >= 2 is an explicit reject
        if let Some(days) = captured_count(&DAYS_RE, posted_at) {
            return days == 1;
        }

        // "قبل N ساعة/ساعات"
        if let Some(hours) = captured_count(&HOURS_RE, posted_at) {
            return match self {
                RecencyWindow::SameDay => hours <= 24,
                RecencyWindow::StrictYesterday => (24..=48).contains(&hours),
            };
        }

        // "قبل ساعة" / "قبل ساعتين" (one or two hours, no digit)
        if posted_at.contains("قبل ساعة")
            || posted_at.contains("قبل ساعتين")
            || posted_at.contains("قبل ساعتان")
        {
            return *self == RecencyWindow::SameDay;
        }

        // minutes or "الآن" (just now)
        if posted_at.contains("دقيقة") || posted_at.contains("دقائق") || posted_at.contains("الآن")
        {
            return *self == RecencyWindow::SameDay;
        }

        debug!("Unrecognized posted-at phrase: '{}'", posted_at);
        false
    }
}

fn captured_count(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

// ── Tests ──
