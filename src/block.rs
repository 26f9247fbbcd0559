/// Lock-step block sequence: one block in flight, numbered from 1 and
/// wrapping modulo 65536.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockCounter {
    current: u16,
    exchanged: u64,
}

impl BlockCounter {
    pub fn new() -> Self {
        Self {
            current: 1,
            exchanged: 0,
        }
    }

    /// Block number of the Data/Ack pair in flight.
    pub fn current(&self) -> u16 {
        self.current
    }

    pub fn matches(&self, block: u16) -> bool {
        block == self.current
    }

    /// Number of completed Data/Ack exchanges, unaffected by wrapping.
    pub fn exchanged(&self) -> u64 {
        self.exchanged
    }

    pub fn advance(&mut self) {
        self.current = self.current.wrapping_add(1);
        self.exchanged += 1;
    }
}

impl Default for BlockCounter {
    fn default() -> Self {
        Self::new()
    }
}
