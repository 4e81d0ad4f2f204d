//! Dense user×item score matrix

use crate::error::{ShareError, ShareResult};
use crate::mode;
use crate::model::{BufferSink, Buffers, Shareable};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

/// Dense matrix of predicted scores, one row per user, one column per item
///
/// The score payload is the single out-of-band buffer; while a sharing scope
/// is active the skeleton carries only the dimensions.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScoreMatrix {
    n_users: usize,
    n_items: usize,
    #[serde(default)]
    scores: Vec<f32>,
}

impl ScoreMatrix {
    /// Create a zero-filled matrix
    pub fn new(n_users: usize, n_items: usize) -> Self {
        Self {
            n_users,
            n_items,
            scores: vec![0.0; n_users * n_items],
        }
    }

    /// Build a matrix from a row-major score vector
    pub fn from_scores(n_users: usize, n_items: usize, scores: Vec<f32>) -> ShareResult<Self> {
        if scores.len() != n_users * n_items {
            return Err(ShareError::BufferSize {
                expected: n_users * n_items,
                actual: scores.len(),
            });
        }
        Ok(Self {
            n_users,
            n_items,
            scores,
        })
    }

    /// Number of users (rows)
    pub fn n_users(&self) -> usize {
        self.n_users
    }

    /// Number of items (columns)
    pub fn n_items(&self) -> usize {
        self.n_items
    }

    /// Score for one user/item pair
    pub fn score(&self, user: usize, item: usize) -> f32 {
        self.scores[user * self.n_items + item]
    }

    /// Set the score for one user/item pair
    pub fn set_score(&mut self, user: usize, item: usize, score: f32) {
        self.scores[user * self.n_items + item] = score;
    }

    /// Row-major score payload
    pub fn scores(&self) -> &[f32] {
        &self.scores
    }
}

impl Serialize for ScoreMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ScoreMatrix", 3)?;
        state.serialize_field("n_users", &self.n_users)?;
        state.serialize_field("n_items", &self.n_items)?;
        if mode::is_sharing() {
            // Scores travel out of band
            state.serialize_field("scores", &Vec::<f32>::new())?;
        } else {
            state.serialize_field("scores", &self.scores)?;
        }
        state.end()
    }
}

impl Shareable for ScoreMatrix {
    fn export_buffers(&self, sink: &mut dyn BufferSink) -> ShareResult<()> {
        let mut bytes = Vec::with_capacity(self.scores.len() * 4);
        for score in &self.scores {
            bytes.extend_from_slice(&score.to_le_bytes());
        }
        sink.put(&bytes)
    }

    fn import_buffers(&mut self, buffers: &mut Buffers<'_>) -> ShareResult<()> {
        let bytes = buffers.next()?;
        let expected = self.n_users * self.n_items * 4;
        if bytes.len() != expected {
            return Err(ShareError::BufferSize {
                expected,
                actual: bytes.len(),
            });
        }
        self.scores = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Ok(())
    }
}
