#[cfg(test)]
#[path = "presenter_test.rs"]
mod tests;

use std::io::Write;
use std::time::Duration;

use anyhow::bail;
use anyhow::Result;
use tokio::sync::mpsc;
use yansi::Paint;

use crate::domain::models::Event;
use crate::domain::models::JobError;
use crate::domain::models::ResultSnapshot;

pub const EXIT_COMPLETED: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_CANCELLED: i32 = 130;

/// Resolves a server relative reference such as `/outputs/x.png`.
pub fn resolve_url(server_url: &str, reference: &str) -> String {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return reference.to_string();
    }

    return format!(
        "{}/{}",
        server_url.trim_end_matches('/'),
        reference.trim_start_matches('/')
    );
}

fn image_urls(snapshot: &ResultSnapshot) -> Vec<String> {
    let mut res = snapshot
        .pages
        .iter()
        .filter_map(|page| return page.image_url.clone())
        .collect::<Vec<String>>();

    if let Some(image_url) = &snapshot.image_url {
        if !res.contains(image_url) {
            res.insert(0, image_url.to_string());
        }
    }

    return res;
}

/// Renders job events to a terminal. Recognized text goes to `out` as it
/// arrives, everything else to `err`.
pub struct ResultPresenter<O: Write, E: Write> {
    out: O,
    err: E,
    server_url: String,
    print_json: bool,
    printed: usize,
    elapsed: Duration,
}

impl<O: Write, E: Write> ResultPresenter<O, E> {
    pub fn new(out: O, err: E, server_url: &str, print_json: bool) -> ResultPresenter<O, E> {
        return ResultPresenter {
            out,
            err,
            server_url: server_url.to_string(),
            print_json,
            printed: 0,
            elapsed: Duration::ZERO,
        };
    }

    fn print_text(&mut self, text: &str) -> Result<()> {
        if self.print_json {
            return Ok(());
        }

        // Accumulated text only ever grows, unless a fallback result replaced it.
        let delta = if text.len() >= self.printed && text.is_char_boundary(self.printed) {
            &text[self.printed..]
        } else {
            writeln!(self.out)?;
            text
        };

        if !delta.is_empty() {
            write!(self.out, "{delta}")?;
            self.out.flush()?;
        }
        self.printed = text.len();

        return Ok(());
    }

    fn print_summary(&mut self, snapshot: &ResultSnapshot) -> Result<()> {
        if self.print_json {
            writeln!(self.out, "{}", serde_json::to_string_pretty(snapshot)?)?;
            return Ok(());
        }

        if self.printed > 0 {
            writeln!(self.out)?;
        }

        let duration_ms = snapshot
            .duration_ms
            .unwrap_or_else(|| return self.elapsed.as_millis() as u64);

        let mut summary = format!("Completed in {:.2}s", duration_ms as f64 / 1000.0);
        if !snapshot.pages.is_empty() {
            let noun = if snapshot.pages.len() == 1 { "page" } else { "pages" };
            summary = format!("{summary}, {} {noun}", snapshot.pages.len());
        }
        writeln!(self.err, "\n{}", Paint::green(summary))?;

        for url in image_urls(snapshot) {
            writeln!(self.err, "Image: {}", resolve_url(&self.server_url, &url))?;
        }

        return Ok(());
    }

    fn print_failure(&mut self, err: &JobError) -> Result<()> {
        if self.printed > 0 {
            writeln!(self.out)?;
        }
        writeln!(self.err, "{}", Paint::red(format!("Recognition failed: {err}")))?;

        return Ok(());
    }

    /// Renders a single event. Returns the exit code once the job reached a
    /// terminal state.
    pub fn handle(&mut self, event: Event) -> Result<Option<i32>> {
        match event {
            Event::JobProgress(elapsed) => {
                self.elapsed = elapsed;
            }
            Event::JobSnapshot(snapshot) => {
                self.print_text(&snapshot.text)?;
            }
            Event::JobFallback(elapsed) => {
                self.elapsed = elapsed;
                writeln!(
                    self.err,
                    "{}",
                    Paint::yellow(format!(
                        "No streamed output after {:.1}s, retrying without streaming",
                        elapsed.as_secs_f64()
                    ))
                )?;
            }
            Event::JobCompleted(snapshot) => {
                self.print_text(&snapshot.text)?;
                self.print_summary(&snapshot)?;
                return Ok(Some(EXIT_COMPLETED));
            }
            Event::JobFailed(err) => {
                self.print_failure(&err)?;
                return Ok(Some(EXIT_FAILED));
            }
            Event::JobCancelled(notice) => {
                if self.printed > 0 {
                    writeln!(self.out)?;
                }
                writeln!(self.err, "{}", Paint::yellow(notice))?;
                return Ok(Some(EXIT_CANCELLED));
            }
        }

        return Ok(None);
    }

    pub async fn start(mut self, mut rx: mpsc::UnboundedReceiver<Event>) -> Result<i32> {
        while let Some(event) = rx.recv().await {
            if let Some(code) = self.handle(event)? {
                return Ok(code);
            }
        }

        bail!("Recognition stopped before the job finished");
    }
}
