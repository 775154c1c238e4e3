use crate::error::{BufferKind, DeviceError};

/// Result of reserving a region of a [`DynamicBuffer`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct Mapping {
    pub offset: u32,
    pub len: u32,
    /// The region restarted at 0; everything recorded against the old
    /// contents must be submitted before it is overwritten.
    pub wrapped: bool,
}

/// Fixed-capacity ring with a CPU staging copy.
///
/// Regions are handed out front to back and restart at 0 when the next one
/// does not fit. The cursor is kept 4-byte aligned.
#[derive(Debug)]
pub(crate) struct DynamicBuffer {
    kind: BufferKind,
    staging: Vec<u8>,
    cursor: u32,
    draw_pos: u32,
    mapped: Option<Mapping>,
    /// Cursor and draw position before the current mapping.
    restore: (u32, u32),
}

impl DynamicBuffer {
    pub fn new(kind: BufferKind, capacity: u32) -> Self {
        let capacity = capacity.next_multiple_of(4);
        Self {
            kind,
            staging: vec![0; capacity as usize],
            cursor: 0,
            draw_pos: 0,
            mapped: None,
            restore: (0, 0),
        }
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.staging.len() as u32
    }

    #[inline]
    pub fn is_mapped(&self) -> bool {
        self.mapped.is_some()
    }

    /// Start of the most recently mapped region.
    #[inline]
    pub fn draw_pos(&self) -> u32 {
        self.draw_pos
    }

    pub fn map(&mut self, bytes: u32) -> Result<Mapping, DeviceError> {
        if self.mapped.is_some() {
            return Err(DeviceError::AlreadyMapped(self.kind));
        }
        let capacity = self.capacity();
        if bytes > capacity {
            return Err(DeviceError::MapOverflow {
                buffer: self.kind,
                requested: bytes,
                capacity,
            });
        }

        let wrapped = self.cursor != 0 && bytes > capacity - self.cursor;
        let offset = if wrapped { 0 } else { self.cursor };

        let mapping = Mapping {
            offset,
            len: bytes,
            wrapped,
        };
        self.restore = (self.cursor, self.draw_pos);
        self.cursor = (offset + bytes).next_multiple_of(4).min(capacity);
        self.draw_pos = offset;
        self.mapped = Some(mapping);
        Ok(mapping)
    }

    /// Writable view of the mapped region; empty when nothing is mapped.
    pub fn region_mut(&mut self) -> &mut [u8] {
        match self.mapped {
            Some(m) => &mut self.staging[m.offset as usize..(m.offset + m.len) as usize],
            None => &mut [],
        }
    }

    /// Abandons the current mapping and rewinds the ring to where it was.
    pub fn cancel(&mut self) {
        if self.mapped.take().is_some() {
            (self.cursor, self.draw_pos) = self.restore;
        }
    }

    /// Ends the mapping and returns the region to upload.
    pub fn unmap(&mut self) -> Result<(u32, &[u8]), DeviceError> {
        let m = self.mapped.take().ok_or(DeviceError::NotMapped(self.kind))?;
        let data = &self.staging[m.offset as usize..(m.offset + m.len) as usize];
        Ok((m.offset, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regions_advance_aligned() {
        let mut ring = DynamicBuffer::new(BufferKind::Vertices, 64);
        let a = ring.map(6).unwrap();
        ring.unmap().unwrap();
        let b = ring.map(8).unwrap();
        assert_eq!(a.offset, 0);
        assert_eq!(b.offset, 8);
        assert!(!b.wrapped);
        assert_eq!(ring.draw_pos(), 8);
    }

    #[test]
    fn wraps_when_region_does_not_fit() {
        let mut ring = DynamicBuffer::new(BufferKind::Indices, 16);
        ring.map(12).unwrap();
        ring.unmap().unwrap();
        let m = ring.map(8).unwrap();
        assert!(m.wrapped);
        assert_eq!(m.offset, 0);
    }

    #[test]
    fn exact_fit_does_not_wrap() {
        let mut ring = DynamicBuffer::new(BufferKind::Vertices, 16);
        ring.map(8).unwrap();
        ring.unmap().unwrap();
        let m = ring.map(8).unwrap();
        assert!(!m.wrapped);
        assert_eq!(m.offset, 8);
    }

    #[test]
    fn full_capacity_map_is_allowed() {
        let mut ring = DynamicBuffer::new(BufferKind::Vertices, 32);
        let m = ring.map(32).unwrap();
        assert_eq!(m.len, 32);
        assert_eq!(ring.region_mut().len(), 32);
    }

    #[test]
    fn oversized_map_is_rejected() {
        let mut ring = DynamicBuffer::new(BufferKind::Vertices, 32);
        match ring.map(33) {
            Err(DeviceError::MapOverflow {
                requested,
                capacity,
                ..
            }) => {
                assert_eq!(requested, 33);
                assert_eq!(capacity, 32);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!ring.is_mapped());
    }

    #[test]
    fn map_state_is_checked() {
        let mut ring = DynamicBuffer::new(BufferKind::Indices, 32);
        assert!(matches!(ring.unmap(), Err(DeviceError::NotMapped(BufferKind::Indices))));
        ring.map(4).unwrap();
        assert!(matches!(ring.map(4), Err(DeviceError::AlreadyMapped(BufferKind::Indices))));
    }

    #[test]
    fn unmap_returns_written_bytes() {
        let mut ring = DynamicBuffer::new(BufferKind::Vertices, 32);
        ring.map(4).unwrap();
        ring.region_mut().copy_from_slice(&[1, 2, 3, 4]);
        let (offset, data) = ring.unmap().unwrap();
        assert_eq!(offset, 0);
        assert_eq!(data, &[1, 2, 3, 4]);
    }

    #[test]
    fn cancel_rewinds_the_ring() {
        let mut ring = DynamicBuffer::new(BufferKind::Vertices, 32);
        ring.map(4).unwrap();
        ring.unmap().unwrap();
        ring.map(24).unwrap();
        ring.unmap().unwrap();
        assert_eq!(ring.draw_pos(), 4);

        assert!(ring.map(8).unwrap().wrapped);
        assert_eq!(ring.draw_pos(), 0);
        ring.cancel();
        assert!(!ring.is_mapped());
        assert_eq!(ring.draw_pos(), 4);

        // Back at 28, so the same map wraps again.
        assert!(ring.map(8).unwrap().wrapped);
        ring.unmap().unwrap();
        assert_eq!(ring.map(4).unwrap().offset, 8);
    }

    #[test]
    fn capacity_rounds_up() {
        assert_eq!(DynamicBuffer::new(BufferKind::Vertices, 30).capacity(), 32);
    }
}
