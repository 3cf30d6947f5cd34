//! Part assembly: turns tokenizer events into [`Part`]s.

use crate::{
    error::StorageError,
    parser::{headers::Headers, tokenizer::Event},
    part::Part,
    storage::{Entity, SpoolPolicy},
};

#[derive(Debug)]
struct OpenPart {
    headers: Headers,
    entity: Entity,
    is_partial: bool,
}

/// Accumulates one part at a time from [`Event`]s.
///
/// Events before the first header block are ignored, so a stream cut before any
/// header block completes yields nothing. Once headers arrive the part is always
/// yielded: complete at a confirmed delimiter, partial when input ran out.
#[derive(Debug)]
pub struct PartAssembler {
    policy: SpoolPolicy,
    current: Option<OpenPart>,
    next_index: usize,
}

impl PartAssembler {
    /// Creates an assembler that stores bodies according to `policy`.
    pub fn new(policy: SpoolPolicy) -> Self {
        Self {
            policy,
            current: None,
            next_index: 0,
        }
    }

    /// Number of parts yielded so far.
    pub fn yielded(&self) -> usize {
        self.next_index
    }

    /// Returns `true` while a part is open.
    pub fn in_part(&self) -> bool {
        self.current.is_some()
    }

    /// Feeds one event, returning a part when the event concludes one.
    pub fn accept(&mut self, event: Event) -> Result<Option<Part>, StorageError> {
        match event {
            Event::Headers {
                headers,
                is_partial,
            } => {
                let finished = match self.current.take() {
                    Some(open) => Some(self.finish(open, false)?),
                    None => None,
                };
                self.current = Some(OpenPart {
                    headers,
                    entity: Entity::new(),
                    is_partial,
                });
                Ok(finished)
            }
            Event::Content { data, is_partial } => {
                let Some(open) = self.current.as_mut() else {
                    return Ok(None);
                };
                if let Err(err) = open.entity.append(&data, &self.policy) {
                    self.abandon();
                    return Err(err);
                }
                open.is_partial |= is_partial;
                Ok(None)
            }
            Event::Delimiter { is_partial, .. } => match self.current.take() {
                Some(open) => self.finish(open, is_partial).map(Some),
                None => Ok(None),
            },
            Event::EndOfInput => match self.current.take() {
                Some(open) => self.finish(open, true).map(Some),
                None => Ok(None),
            },
        }
    }

    /// Drops the open part, deleting any spool file it created.
    pub fn abandon(&mut self) {
        if let Some(mut open) = self.current.take() {
            let _ = open.entity.release();
        }
    }

    fn finish(&mut self, mut open: OpenPart, truncated: bool) -> Result<Part, StorageError> {
        if let Err(err) = open.entity.seal() {
            let _ = open.entity.release();
            return Err(err);
        }

        let is_partial = open.is_partial || truncated;
        let index = self.next_index;
        self.next_index += 1;

        #[cfg(feature = "tracing")]
        {
            if is_partial {
                tracing::warn!(
                    index,
                    size = open.entity.len(),
                    "assembler: part truncated by end of input, keeping it as partial"
                );
            } else {
                tracing::debug!(
                    index,
                    size = open.entity.len(),
                    spooled = open.entity.is_spooled(),
                    "assembler: part complete"
                );
            }
        }

        Ok(Part::new(index, open.headers, open.entity, is_partial))
    }
}
