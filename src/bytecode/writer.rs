use crate::bytecode::ir::ProgramPos;
use crate::lang::names::LabelId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Patch {
    at: usize,
    label: LabelId,
}

/// Append-only code buffer with label bookkeeping.
///
/// Label operands are written as zeroed 4-byte placeholders and back-filled
/// by [`CodeWriter::finish`] once every label position is known.
#[derive(Debug, Default)]
pub struct CodeWriter {
    code: Vec<u8>,
    labels: Vec<Option<ProgramPos>>,
    patches: Vec<Patch>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelFault {
    AlreadyDefined(LabelId),
    Unresolved(LabelId),
    CodeTooLarge,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.code
    }

    pub fn pos(&self) -> Result<ProgramPos, LabelFault> {
        u32::try_from(self.code.len())
            .map(ProgramPos::new)
            .map_err(|_| LabelFault::CodeTooLarge)
    }

    pub fn push_u8(&mut self, byte: u8) {
        self.code.push(byte);
    }

    pub fn push_i32(&mut self, value: i32) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.code.extend_from_slice(bytes);
    }

    pub fn push_label(&mut self, label: LabelId) {
        self.patches.push(Patch {
            at: self.code.len(),
            label,
        });
        self.code.extend_from_slice(&[0; 4]);
    }

    pub fn new_label(&mut self) -> LabelId {
        let id = LabelId(self.labels.len() as u16);
        self.labels.push(None);
        id
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    pub fn is_defined(&self, label: LabelId) -> bool {
        matches!(self.labels.get(usize::from(label.0)), Some(Some(_)))
    }

    /// Binds `label` to the current end of the code.
    pub fn define_label(&mut self, label: LabelId) -> Result<ProgramPos, LabelFault> {
        let here = self.pos()?;
        match self.labels.get_mut(usize::from(label.0)) {
            Some(slot) if slot.is_none() => {
                *slot = Some(here);
                Ok(here)
            }
            _ => Err(LabelFault::AlreadyDefined(label)),
        }
    }

    /// Back-fills every label placeholder and returns the finished code.
    pub fn finish(mut self) -> Result<Vec<u8>, LabelFault> {
        for patch in &self.patches {
            let target = self
                .labels
                .get(usize::from(patch.label.0))
                .copied()
                .flatten()
                .ok_or(LabelFault::Unresolved(patch.label))?;
            self.code[patch.at..patch.at + 4].copy_from_slice(&target.get().to_le_bytes());
        }
        Ok(self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_and_backward_labels_resolve_to_same_offset() {
        let mut w = CodeWriter::new();
        let label = w.new_label();
        w.push_u8(0xAA);
        w.push_label(label);
        w.define_label(label).unwrap();
        w.push_u8(0xBB);
        w.push_label(label);
        let code = w.finish().unwrap();
        assert_eq!(&code[1..5], &5u32.to_le_bytes());
        assert_eq!(&code[6..10], &5u32.to_le_bytes());
    }

    #[test]
    fn test_unresolved_label() {
        let mut w = CodeWriter::new();
        let label = w.new_label();
        w.push_label(label);
        assert_eq!(w.finish(), Err(LabelFault::Unresolved(label)));
    }

    #[test]
    fn test_label_defined_twice() {
        let mut w = CodeWriter::new();
        let label = w.new_label();
        w.define_label(label).unwrap();
        assert!(w.is_defined(label));
        assert_eq!(w.define_label(label), Err(LabelFault::AlreadyDefined(label)));
    }
}
