//! Stop-sequence handling for engines that decode token by token.
//!
//! Text is held back while it could still be the start of a stop sequence,
//! so nothing past a stop ever reaches the caller.

/// Incremental stop-sequence matcher.
#[derive(Debug, Default)]
pub struct StopScanner {
    stops: Vec<String>,
    produced: String,
    emitted: usize,
    stopped: bool,
}

impl StopScanner {
    pub fn new(stops: &[String]) -> Self {
        Self {
            stops: stops.iter().filter(|s| !s.is_empty()).cloned().collect(),
            ..Self::default()
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Add decoded text; returns whatever is now safe to emit.
    pub fn push(&mut self, piece: &str) -> Option<String> {
        if self.stopped {
            return None;
        }
        self.produced.push_str(piece);

        let earliest = self
            .stops
            .iter()
            .filter_map(|stop| self.produced[self.emitted..].find(stop.as_str()))
            .min();
        if let Some(offset) = earliest {
            self.stopped = true;
            return self.take_until(self.emitted + offset);
        }

        let held = self.partial_match_len();
        self.take_until(self.produced.len() - held)
    }

    /// Release any held-back text at end of generation.
    pub fn finish(&mut self) -> Option<String> {
        if self.stopped {
            return None;
        }
        self.take_until(self.produced.len())
    }

    /// Longest suffix of the unemitted text that is a proper prefix of a stop.
    fn partial_match_len(&self) -> usize {
        let pending = &self.produced[self.emitted..];
        self.stops
            .iter()
            .flat_map(|stop| {
                stop.char_indices()
                    .skip(1)
                    .map(|(i, _)| &stop[..i])
                    .filter(|prefix| pending.ends_with(prefix))
                    .map(str::len)
            })
            .max()
            .unwrap_or(0)
    }

    fn take_until(&mut self, end: usize) -> Option<String> {
        if end <= self.emitted {
            return None;
        }
        let text = self.produced[self.emitted..end].to_string();
        self.emitted = end;
        Some(text)
    }
}
