//! Narrow band bookkeeping.

/// Voxels near the zero level set.
///
/// The band is a dense list of linear voxel offsets plus a parallel flag
/// array over the whole grid for O(1) membership tests. Each entry also
/// records its layer: 0 for voxels adjacent to the zero crossing, `k` for
/// voxels `k` steps further out.
///
/// Only band voxels are updated during an iteration; everything else keeps
/// its value until the band is rebuilt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NarrowBand {
    indices: Vec<usize>,
    layers: Vec<u16>,
    member: Vec<bool>,
}

impl NarrowBand {
    /// Creates an empty band over a grid of `voxel_count` voxels.
    #[must_use]
    pub fn new(voxel_count: usize) -> Self {
        Self {
            indices: Vec::new(),
            layers: Vec::new(),
            member: vec![false; voxel_count],
        }
    }

    /// Removes every voxel, keeping the allocation.
    pub fn clear(&mut self) {
        for &linear in &self.indices {
            self.member[linear] = false;
        }
        self.indices.clear();
        self.layers.clear();
    }

    /// Adds a voxel. Returns `false` if it was already a member.
    pub fn insert(&mut self, linear: usize, layer: u16) -> bool {
        if self.member[linear] {
            return false;
        }
        self.member[linear] = true;
        self.indices.push(linear);
        self.layers.push(layer);
        true
    }

    /// Whether a voxel is in the band.
    #[must_use]
    pub fn contains(&self, linear: usize) -> bool {
        self.member.get(linear).copied().unwrap_or(false)
    }

    /// Number of band voxels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether the band is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Size of the grid the band was created for.
    #[must_use]
    pub fn voxel_count(&self) -> usize {
        self.member.len()
    }

    /// Linear offsets of the band voxels, in insertion order.
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Pairs of (linear offset, layer).
    pub fn iter(&self) -> impl Iterator<Item = (usize, u16)> + '_ {
        self.indices.iter().copied().zip(self.layers.iter().copied())
    }

    /// Number of voxels in a given layer.
    #[must_use]
    pub fn layer_len(&self, layer: u16) -> usize {
        self.layers.iter().filter(|&&l| l == layer).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_membership() {
        let mut band = NarrowBand::new(10);
        assert!(band.is_empty());
        assert!(band.insert(3, 0));
        assert!(band.insert(7, 1));
        assert!(!band.insert(3, 2));

        assert_eq!(band.len(), 2);
        assert!(band.contains(3));
        assert!(!band.contains(4));
        assert!(!band.contains(100));
        assert_eq!(band.iter().collect::<Vec<_>>(), vec![(3, 0), (7, 1)]);
        assert_eq!(band.layer_len(1), 1);
    }

    #[test]
    fn clear_resets_flags() {
        let mut band = NarrowBand::new(4);
        band.insert(0, 0);
        band.insert(2, 0);
        band.clear();
        assert!(band.is_empty());
        assert!(!band.contains(0));
        assert!(band.insert(0, 1));
    }
}
