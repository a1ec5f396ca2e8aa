/// Hard upper bound on registers per invocation.
pub const MAX_REGISTERS: usize = 64;

/// Per-invocation register storage.
///
/// Out-of-range indices read as 0 and ignore writes; verified programs never
/// produce them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    slots: [i32; MAX_REGISTERS],
}

impl Default for RegisterFile {
    fn default() -> Self {
        RegisterFile {
            slots: [0; MAX_REGISTERS],
        }
    }
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: u8) -> i32 {
        self.slots.get(usize::from(index)).copied().unwrap_or(0)
    }

    pub fn set(&mut self, index: u8, value: i32) {
        if let Some(slot) = self.slots.get_mut(usize::from(index)) {
            *slot = value;
        }
    }

    /// Zeroes the first `used` slots and writes `inputs` from slot 0.
    pub fn reset(&mut self, used: usize, inputs: &[i32]) {
        let used = used.min(MAX_REGISTERS);
        self.slots[..used].fill(0);
        for (slot, value) in self.slots.iter_mut().zip(inputs) {
            *slot = *value;
        }
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.slots
    }
}
