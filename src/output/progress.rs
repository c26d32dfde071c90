use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{figure, good, heading};

/// Progress tracking for the three collection phases
pub struct PhaseProgress {
    pb: ProgressBar,
}

impl PhaseProgress {
    pub fn start_phase_1() -> Self {
        eprintln!("{}  {}", heading("⚙️"), heading("Phases").underlined());
        let pb = create_spinner(figure("Phase 1/3: Fetching builds").to_string());
        Self { pb }
    }

    pub fn set_message(&self, message: &str) {
        self.pb
            .set_message(figure(format!("Phase 1/3: {message}")).to_string());
    }

    pub fn finish_phase_1_start_phase_2(self, build_count: usize) -> Self {
        self.pb.finish_with_message(
            good(format!("Phase 1/3: Fetched {build_count} builds ✓")).to_string(),
        );
        let pb = create_spinner(figure("Phase 2/3: Merging job history").to_string());
        Self { pb }
    }

    pub fn finish_phase_2_start_phase_3(self, job_count: usize) -> Self {
        self.pb.finish_with_message(
            good(format!("Phase 2/3: Merged history for {job_count} jobs ✓")).to_string(),
        );
        let pb = create_spinner(figure("Phase 3/3: Saving history").to_string());
        Self { pb }
    }

    pub fn finish_phase_3(self, written: bool) {
        let message = if written {
            "Phase 3/3: History saved ✓"
        } else {
            "Phase 3/3: History unchanged ✓"
        };
        self.pb.finish_with_message(good(message).to_string());
        eprintln!();
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    if let Ok(style) = ProgressStyle::default_spinner().template("  {msg} {spinner}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
