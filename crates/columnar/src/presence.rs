//! Presence vectors
//!
//! A presence vector records which rows of a nullable position hold a
//! value. It is run-length encoded as alternating run counts, starting with
//! a (possibly zero) run of values. A position that saw no nulls writes no
//! presence vector at all, and an empty segmap reads as "all present".

use crate::io::WriteSink;
use crate::segment::{Segment, SegmentReader, SegmentStream, Spiller};
use zed_core::Result;

#[derive(Debug, Default)]
pub(crate) struct PresenceWriter {
    runs: Vec<u64>,
    in_values: bool,
    run: u64,
    nulls: u64,
    stream: SegmentStream,
}

impl PresenceWriter {
    pub(crate) fn new() -> Self {
        PresenceWriter {
            in_values: true,
            ..Default::default()
        }
    }

    pub(crate) fn value(&mut self) {
        if !self.in_values {
            self.runs.push(self.run);
            self.run = 0;
            self.in_values = true;
        }
        self.run += 1;
    }

    pub(crate) fn null(&mut self) {
        if self.in_values {
            self.runs.push(self.run);
            self.run = 0;
            self.in_values = false;
        }
        self.run += 1;
        self.nulls += 1;
    }

    /// Write the runs, if any null was seen. Called once, at end of input.
    pub(crate) fn finish<S: WriteSink>(&mut self, sp: &mut Spiller<S>) -> Result<()> {
        if self.nulls == 0 {
            return Ok(());
        }
        self.runs.push(self.run);
        self.run = 0;
        for run in std::mem::take(&mut self.runs) {
            self.stream.append_uint(run, sp)?;
        }
        self.stream.flush(sp)
    }

    pub(crate) fn segments(&self) -> Vec<Segment> {
        self.stream.segments().to_vec()
    }
}

pub(crate) struct PresenceReader {
    runs: Option<SegmentReader>,
    in_values: bool,
    left: u64,
}

impl PresenceReader {
    /// A reader over `runs`, or an all-present reader when `runs` has no
    /// segments.
    pub(crate) fn new(runs: Option<SegmentReader>) -> Self {
        PresenceReader {
            runs,
            // toggled to "values" when the first run is loaded
            in_values: false,
            left: 0,
        }
    }

    /// Whether the next row holds a value.
    pub(crate) fn next(&mut self) -> Result<bool> {
        let runs = match self.runs.as_mut() {
            Some(r) => r,
            None => return Ok(true),
        };
        while self.left == 0 {
            self.left = runs.uint()?;
            self.in_values = !self.in_values;
        }
        self.left -= 1;
        Ok(self.in_values)
    }
}
