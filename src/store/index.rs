//! Índice exato de vizinho mais próximo sobre um buffer flat de vetores.

use serde::{Deserialize, Serialize};

use crate::{LoreError, LoreResult};

/// Distância euclidiana ao quadrado. Slices de tamanhos diferentes ficam infinitamente longe.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Buffer row-major de vetores de dimensão fixa, buscado por varredura linear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    /// Reconstrói um índice a partir de um buffer cru, validando o formato.
    pub fn from_raw(dimension: usize, data: Vec<f32>) -> LoreResult<Self> {
        if dimension == 0 {
            return Err(LoreError::other("index dimension must be positive"));
        }
        if data.len() % dimension != 0 {
            return Err(LoreError::other(format!(
                "index buffer of {} floats is not a multiple of dimension {}",
                data.len(),
                dimension
            )));
        }
        Ok(Self { dimension, data })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn raw(&self) -> &[f32] {
        &self.data
    }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Adiciona um vetor; rejeita dimensão errada sem alterar o índice.
    pub fn push(&mut self, vector: &[f32]) -> LoreResult<()> {
        if vector.len() != self.dimension {
            return Err(LoreError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        self.data.extend_from_slice(vector);
        Ok(())
    }

    /// Retorna até `k` pares `(posição, distância)`, mais próximos primeiro.
    ///
    /// Distâncias iguais mantêm a ordem de inserção.
    pub fn nearest(&self, query: &[f32], k: usize) -> LoreResult<Vec<(usize, f32)>> {
        if query.len() != self.dimension {
            return Err(LoreError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(i, v)| (i, squared_l2(query, v)))
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }
}
