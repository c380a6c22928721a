//! Contiguous vector storage backing the HNSW graph.
//!
//! Vectors live in one flat `Vec<f32>` of `D·N` floats, outside the graph
//! itself, so distance kernels always operate on aligned, contiguous runs.
//! Removal is append-with-swap-and-pop: the last row is moved into the
//! freed slot so the buffer never fragments, which keeps ids stable while
//! row indices are not — callers must always look vectors up by id through
//! [`VectorBuffer::row_of`], never cache a row index across a mutation.

use std::collections::HashMap;

use crate::vector::VectorId;

pub struct VectorBuffer {
    dim: usize,
    data: Vec<f32>,
    id_to_row: HashMap<VectorId, usize>,
    row_to_id: Vec<VectorId>,
}

impl VectorBuffer {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            data: Vec::new(),
            id_to_row: HashMap::new(),
            row_to_id: Vec::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.row_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_to_id.is_empty()
    }

    pub fn contains(&self, id: VectorId) -> bool {
        self.id_to_row.contains_key(&id)
    }

    pub fn row_of(&self, id: VectorId) -> Option<usize> {
        self.id_to_row.get(&id).copied()
    }

    /// Appends `vector` under `id`. Caller must ensure `id` isn't already
    /// present and `vector.len() == self.dim`.
    pub fn push(&mut self, id: VectorId, vector: &[f32]) {
        debug_assert_eq!(vector.len(), self.dim);
        let row = self.row_to_id.len();
        self.data.extend_from_slice(vector);
        self.row_to_id.push(id);
        self.id_to_row.insert(id, row);
    }

    /// Removes `id`'s row, swapping the last row into its place. Returns
    /// the id that now occupies the vacated slot's old row (the one that
    /// was moved), if any row other than the removed one existed.
    pub fn remove(&mut self, id: VectorId) -> Option<VectorId> {
        let row = self.id_to_row.remove(&id)?;
        let last_row = self.row_to_id.len() - 1;

        if row != last_row {
            let moved_id = self.row_to_id[last_row];
            for d in 0..self.dim {
                self.data[row * self.dim + d] = self.data[last_row * self.dim + d];
            }
            self.row_to_id[row] = moved_id;
            self.id_to_row.insert(moved_id, row);
        }

        self.row_to_id.pop();
        self.data.truncate(self.row_to_id.len() * self.dim);

        if row != last_row {
            Some(self.row_to_id[row])
        } else {
            None
        }
    }

    pub fn row_slice(&self, row: usize) -> &[f32] {
        &self.data[row * self.dim..(row + 1) * self.dim]
    }

    pub fn get(&self, id: VectorId) -> Option<&[f32]> {
        self.row_of(id).map(|row| self.row_slice(row))
    }

    pub fn ids(&self) -> impl Iterator<Item = VectorId> + '_ {
        self.row_to_id.iter().copied()
    }

    pub fn memory_bytes(&self) -> usize {
        self.data.capacity() * std::mem::size_of::<f32>()
            + self.id_to_row.capacity() * (std::mem::size_of::<VectorId>() + std::mem::size_of::<usize>())
            + self.row_to_id.capacity() * std::mem::size_of::<VectorId>()
    }
}
