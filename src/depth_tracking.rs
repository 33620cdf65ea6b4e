use crate::{
    element::Element,
    error::{Error, Result},
};

#[derive(Clone, Copy, Debug)]
struct Frame {
    dictionary: bool,
    items: usize,
}

/// Tracks the arrays and dictionaries that are currently open while walking a collatable
/// stream, so that end markers can be checked against them.
#[derive(Clone, Debug)]
pub struct DepthTracker {
    tracking: Vec<Frame>,
    max_depth: usize,
}

impl DepthTracker {
    /// Create a new depth tracker
    pub fn new(max_depth: usize) -> Self {
        Self {
            tracking: Vec::new(),
            max_depth,
        }
    }

    /// Number of currently open arrays & dictionaries.
    pub fn depth(&self) -> usize {
        self.tracking.len()
    }

    /// Update the depth tracker on each new element. On error, the tracker is left unchanged.
    pub fn update_elem(&mut self, elem: &Element) -> Result<()> {
        if let Element::EndSequence = elem {
            let frame = self.tracking.last().ok_or_else(|| {
                Error::BadEncode("EndSequence found outside of any array or dictionary".to_string())
            })?;
            if frame.dictionary && frame.items % 2 == 1 {
                return Err(Error::BadEncode(
                    "Dictionary ended between a key and its value".to_string(),
                ));
            }
            self.tracking.pop();
            return Ok(());
        }

        let nested = match elem {
            Element::Array => Some(false),
            Element::Dictionary => Some(true),
            _ => None,
        };

        // Check to see if we hit the nesting limit
        if nested.is_some() && self.tracking.len() >= self.max_depth {
            return Err(Error::ParseLimit("Depth limit exceeded".to_string()));
        }

        // Count this element against the enclosing sequence
        if let Some(frame) = self.tracking.last_mut() {
            frame.items += 1;
        }
        if let Some(dictionary) = nested {
            self.tracking.push(Frame {
                dictionary,
                items: 0,
            });
        }
        Ok(())
    }
}
