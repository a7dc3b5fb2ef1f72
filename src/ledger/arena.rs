//! Bounded append-only arena
//!
//! Layout of the backing region:
//!
//! ```text
//! [0..8)      used-byte count, little-endian u64
//! [8..8+cap)  ledger bytes, `\n`-terminated lines
//! ```
//!
//! Keeping the offset inside the region lets another process that maps the
//! same segment see exactly how much of it is valid.

use super::backend::{decode_lines, encode_lines, LedgerBackend, LedgerError};

pub const HEADER_LEN: usize = 8;

/// Raw memory an arena lives in
pub trait Region {
    fn as_slice(&self) -> &[u8];
    fn as_mut_slice(&mut self) -> &mut [u8];
}

/// Process-private region, used where no sharing is needed
#[derive(Debug, Clone)]
pub struct HeapRegion(Vec<u8>);

impl HeapRegion {
    pub fn with_capacity(capacity: usize) -> Self {
        HeapRegion(vec![0; HEADER_LEN + capacity])
    }
}

impl Region for HeapRegion {
    fn as_slice(&self) -> &[u8] {
        &self.0
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

/// Used-byte count recorded in a region header, clamped to the region size
pub fn used_in(bytes: &[u8]) -> usize {
    if bytes.len() < HEADER_LEN {
        return 0;
    }
    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(&bytes[..HEADER_LEN]);
    let used = u64::from_le_bytes(header) as usize;
    used.min(bytes.len() - HEADER_LEN)
}

/// Valid ledger bytes of a region (everything after the header up to `used`)
pub fn payload_of(bytes: &[u8]) -> &[u8] {
    let used = used_in(bytes);
    &bytes[HEADER_LEN.min(bytes.len())..HEADER_LEN.min(bytes.len()) + used]
}

#[derive(Debug)]
pub struct Arena<R: Region> {
    region: R,
}

impl<R: Region> Arena<R> {
    /// Wrap a region. The header is left as found.
    pub fn new(region: R) -> Result<Self, LedgerError> {
        if region.as_slice().len() < HEADER_LEN {
            return Err(LedgerError::Segment(format!(
                "region of {} bytes cannot hold the {}-byte header",
                region.as_slice().len(),
                HEADER_LEN
            )));
        }
        Ok(Self { region })
    }

    /// Wrap a region and mark it empty
    pub fn fresh(region: R) -> Result<Self, LedgerError> {
        let mut arena = Self::new(region)?;
        arena.set_used(0);
        Ok(arena)
    }

    pub fn capacity(&self) -> usize {
        self.region.as_slice().len() - HEADER_LEN
    }

    pub fn used(&self) -> usize {
        used_in(self.region.as_slice())
    }

    pub fn available(&self) -> usize {
        self.capacity() - self.used()
    }

    pub fn contents(&self) -> &[u8] {
        payload_of(self.region.as_slice())
    }

    pub fn region(&self) -> &R {
        &self.region
    }

    pub fn into_region(self) -> R {
        self.region
    }

    /// Copy `bytes` after the current contents.
    ///
    /// On overflow nothing is written and `used` is unchanged.
    pub fn try_append(&mut self, bytes: &[u8]) -> Result<usize, LedgerError> {
        let used = self.used();
        let available = self.capacity() - used;
        if bytes.len() > available {
            return Err(LedgerError::CapacityExceeded {
                required: bytes.len(),
                available,
            });
        }

        let start = HEADER_LEN + used;
        self.region.as_mut_slice()[start..start + bytes.len()].copy_from_slice(bytes);
        self.set_used(used + bytes.len());
        Ok(used + bytes.len())
    }

    fn set_used(&mut self, used: usize) {
        self.region.as_mut_slice()[..HEADER_LEN].copy_from_slice(&(used as u64).to_le_bytes());
    }
}

impl<R: Region + Send> LedgerBackend for Arena<R> {
    fn append_lines(&mut self, lines: &[Vec<u8>]) -> Result<usize, LedgerError> {
        let (block, count) = encode_lines(lines);
        if count > 0 {
            self.try_append(&block)?;
        }
        Ok(count)
    }

    fn read_all(&self) -> Result<Vec<String>, LedgerError> {
        Ok(decode_lines(self.contents()))
    }

    fn backend_type(&self) -> &'static str {
        "shared-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn raw(items: &[&str]) -> Vec<Vec<u8>> {
        items.iter().map(|s| s.as_bytes().to_vec()).collect()
    }

    #[test]
    fn test_fresh_arena_is_empty() {
        let arena = Arena::fresh(HeapRegion::with_capacity(64)).unwrap();
        assert_eq!(arena.capacity(), 64);
        assert_eq!(arena.used(), 0);
        assert!(arena.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_append_advances_used() {
        let mut arena = Arena::fresh(HeapRegion::with_capacity(64)).unwrap();
        assert_eq!(arena.append_lines(&raw(&["SU001;a", "SU001;b"])).unwrap(), 2);
        assert_eq!(arena.used(), 16);
        assert_eq!(arena.read_all().unwrap(), lines(&["SU001;a", "SU001;b"]));
    }

    #[test]
    fn test_overflow_leaves_arena_unchanged() {
        let mut arena = Arena::fresh(HeapRegion::with_capacity(20)).unwrap();
        arena.append_lines(&raw(&["SU001;a"])).unwrap();
        let before = arena.contents().to_vec();

        let err = arena
            .append_lines(&raw(&["SU002;bbbbbb", "SU002;cccccc"]))
            .unwrap_err();
        match err {
            LedgerError::CapacityExceeded {
                required,
                available,
            } => {
                assert_eq!(required, 26);
                assert_eq!(available, 12);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(arena.used(), 8);
        assert_eq!(arena.contents(), before.as_slice());
    }

    #[test]
    fn test_exact_fit_is_accepted() {
        let mut arena = Arena::fresh(HeapRegion::with_capacity(8)).unwrap();
        arena.append_lines(&raw(&["SU001;a"])).unwrap();
        assert_eq!(arena.available(), 0);
    }

    #[test]
    fn test_header_survives_rewrap() {
        let mut arena = Arena::fresh(HeapRegion::with_capacity(32)).unwrap();
        arena.append_lines(&raw(&["x;1"])).unwrap();
        let reopened = Arena::new(arena.into_region()).unwrap();
        assert_eq!(reopened.read_all().unwrap(), lines(&["x;1"]));
    }

    #[test]
    fn test_append_counts_raw_bytes() {
        let mut arena = Arena::fresh(HeapRegion::with_capacity(16)).unwrap();
        arena.append_lines(&[b"SU001;\xf1".to_vec()]).unwrap();
        assert_eq!(arena.used(), 8);
        assert_eq!(arena.contents(), b"SU001;\xf1\n");
    }

    #[test]
    fn test_region_too_small() {
        assert!(Arena::new(HeapRegion(vec![0; 4])).is_err());
    }

    #[test]
    fn test_corrupt_header_is_clamped() {
        let mut raw = vec![0u8; HEADER_LEN + 4];
        raw[..HEADER_LEN].copy_from_slice(&1000u64.to_le_bytes());
        assert_eq!(used_in(&raw), 4);
    }
}
