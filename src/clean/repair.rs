//! Width and space repair passes
//!
//! Space violations are fixed by fusing the neighbouring shapes, width
//! violations by deleting the thin run. Each pass only sees one axis, so
//! `clean` alternates passes with orientation switches.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::scanline::{purge_marked, ScanlineStore};
use super::switch::switch_dimensions;
use super::types::Orientation;

/// Passes per phase when the caller does not configure one
pub const DEFAULT_MAX_TRIES: usize = 10;

/// Zero-violation passes in a row that end a phase
const QUIET_PASSES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rule {
    Space,
    Width,
}

/// Outcome of one repair phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseReport {
    pub rule: Rule,
    pub passes: usize,
    pub fixed: usize,
    /// Phase ended on consecutive clean passes rather than on `max_tries`
    pub converged: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanReport {
    pub phases: Vec<PhaseReport>,
}

impl CleanReport {
    pub fn total_fixed(&self) -> usize {
        self.phases.iter().map(|p| p.fixed).sum()
    }

    /// False if any phase ran out of tries with violations still being found
    pub fn is_complete(&self) -> bool {
        self.phases.iter().all(|p| p.converged)
    }
}

impl ScanlineStore {
    /// Fuse neighbouring runs closer than the spacing rule on every active line
    pub fn clean_space(&mut self) -> usize {
        let min_space = self.params().min_space;
        let mut fixed = 0;

        for line in self.active_mut().lines_mut() {
            if line.len() < 4 {
                continue;
            }
            let mut found = false;
            for i in (1..line.len() - 1).step_by(2) {
                if line[i + 1].pos - line[i].pos < min_space - 1 {
                    line[i].marked = true;
                    line[i + 1].marked = true;
                    fixed += 1;
                    found = true;
                }
            }
            if found {
                purge_marked(line);
            }
        }

        fixed
    }

    /// Delete runs narrower than the width rule on every active line
    pub fn clean_width(&mut self) -> usize {
        let min_width = self.params().min_width;
        let mut fixed = 0;

        for line in self.active_mut().lines_mut() {
            let mut found = false;
            for pair in line.chunks_exact_mut(2) {
                if pair[1].pos - pair[0].pos < min_width + 1 {
                    pair[0].marked = true;
                    pair[1].marked = true;
                    fixed += 1;
                    found = true;
                }
            }
            if found {
                purge_marked(line);
            }
        }

        fixed
    }

    /// Run the space, width, space phases and leave the store row oriented.
    ///
    /// Each phase alternates a repair pass with an orientation switch until
    /// two passes in a row find nothing or `max_tries` passes have run. The
    /// result is not guaranteed to be free of violations; phases that stop on
    /// `max_tries` are logged and flagged in the report.
    pub fn clean(&mut self, max_tries: usize) -> CleanReport {
        let mut report = CleanReport::default();
        for rule in [Rule::Space, Rule::Width, Rule::Space] {
            report.phases.push(self.run_phase(rule, max_tries));
        }
        if self.orientation() == Orientation::Column {
            switch_dimensions(self);
        }
        report
    }

    fn run_phase(&mut self, rule: Rule, max_tries: usize) -> PhaseReport {
        let mut phase = PhaseReport {
            rule,
            passes: 0,
            fixed: 0,
            converged: false,
        };
        let mut quiet = 0;

        while phase.passes < max_tries {
            let orientation = self.orientation();
            let fixed = match rule {
                Rule::Space => self.clean_space(),
                Rule::Width => self.clean_width(),
            };
            switch_dimensions(self);
            phase.passes += 1;
            phase.fixed += fixed;
            debug!(?rule, ?orientation, pass = phase.passes, fixed, "repair pass");

            if fixed == 0 {
                quiet += 1;
                if quiet == QUIET_PASSES {
                    phase.converged = true;
                    break;
                }
            } else {
                quiet = 0;
            }
        }

        if !phase.converged {
            warn!(
                ?rule,
                passes = phase.passes,
                fixed = phase.fixed,
                "cleaning stopped before reaching a clean pass in both orientations"
            );
        }
        phase
    }
}
