use crate::backend::ConstantBuffer;

/// Per-submission staging area for constant buffers.
///
/// Every upload lands at a fresh aligned offset, so draws recorded earlier in
/// the same submission keep reading the values they were recorded with. The
/// arena is written to the GPU once per flush and then restarted with the
/// latest value of each buffer.
#[derive(Debug)]
pub(crate) struct UniformArena {
    data: Vec<u8>,
    cursor: usize,
    alignment: usize,
    offsets: [u32; ConstantBuffer::COUNT],
    latest: [[f32; 16]; ConstantBuffer::COUNT],
}

impl UniformArena {
    /// Uploads are spaced by the largest buffer size rounded up to `alignment`.
    /// `capacity` is rounded down to that spacing and raised to hold at least
    /// two uploads per buffer.
    pub fn new(capacity: usize, alignment: usize) -> Self {
        let alignment = ConstantBuffer::Effect.size().next_multiple_of(alignment.max(1));
        let min = alignment * ConstantBuffer::COUNT * 2;
        let capacity = (capacity / alignment * alignment).max(min);

        let mut arena = Self {
            data: vec![0; capacity],
            cursor: 0,
            alignment,
            offsets: [0; ConstantBuffer::COUNT],
            latest: [[0.0; 16]; ConstantBuffer::COUNT],
        };
        arena.restart();
        arena
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Dynamic offsets of the current value of each buffer.
    #[inline]
    pub fn offsets(&self) -> [u32; ConstantBuffer::COUNT] {
        self.offsets
    }

    /// Bytes written since the last restart.
    #[inline]
    pub fn written(&self) -> &[u8] {
        &self.data[..self.cursor]
    }

    /// Stores a new value for `buffer`. Returns false when the arena is full;
    /// the caller must submit and [`restart`](Self::restart) first.
    pub fn push(&mut self, buffer: ConstantBuffer, values: &[f32]) -> bool {
        if self.cursor + self.alignment > self.data.len() {
            return false;
        }
        let latest = &mut self.latest[buffer.index()];
        *latest = [0.0; 16];
        let n = values.len().min(buffer.floats());
        latest[..n].copy_from_slice(&values[..n]);

        self.write(buffer);
        true
    }

    /// Starts a new submission, re-staging the latest value of every buffer.
    pub fn restart(&mut self) {
        self.cursor = 0;
        for buffer in ConstantBuffer::ALL {
            self.write(buffer);
        }
    }

    fn write(&mut self, buffer: ConstantBuffer) {
        let values = &self.latest[buffer.index()][..buffer.floats()];
        let bytes: &[u8] = bytemuck::cast_slice(values);
        self.data[self.cursor..self.cursor + bytes.len()].copy_from_slice(bytes);
        self.offsets[buffer.index()] = self.cursor as u32;
        self.cursor += self.alignment;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(arena: &UniformArena, buffer: ConstantBuffer) -> Vec<f32> {
        let offset = arena.offsets()[buffer.index()] as usize;
        let bytes = &arena.written()[offset..offset + buffer.size()];
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    #[test]
    fn starts_with_every_buffer_staged() {
        let arena = UniformArena::new(4096, 256);
        assert_eq!(arena.offsets(), [0, 256, 512, 768]);
        assert_eq!(arena.written().len(), 1024);
    }

    #[test]
    fn pushes_get_fresh_offsets() {
        let mut arena = UniformArena::new(4096, 256);
        assert!(arena.push(ConstantBuffer::Pixel, &[1.0, 2.0, 3.0, 4.0]));
        assert_eq!(arena.offsets()[ConstantBuffer::Pixel.index()], 1024);
        assert_eq!(&read(&arena, ConstantBuffer::Pixel)[..5], &[1.0, 2.0, 3.0, 4.0, 0.0]);
        // The previous pixel value is still staged at its old offset.
        assert_eq!(arena.offsets()[ConstantBuffer::Vertex.index()], 0);
    }

    #[test]
    fn restart_keeps_latest_values() {
        let mut arena = UniformArena::new(4096, 256);
        arena.push(ConstantBuffer::TexDims, &[64.0, 32.0, 1.0 / 64.0, 1.0 / 32.0]);
        arena.restart();
        assert_eq!(arena.written().len(), 1024);
        assert_eq!(read(&arena, ConstantBuffer::TexDims)[..2], [64.0, 32.0]);
    }

    #[test]
    fn full_arena_refuses_push() {
        let mut arena = UniformArena::new(0, 256);
        assert_eq!(arena.capacity(), 2048);
        for _ in 0..4 {
            assert!(arena.push(ConstantBuffer::Effect, &[1.0]));
        }
        assert!(!arena.push(ConstantBuffer::Effect, &[1.0]));
    }
}
