//! PayloadCodec - Task と content bytes の相互変換
//!
//! content は JSON bytes。スキーマを持たないストア列に入るので、
//! 型との対応はここでだけ保証されます。

use super::task::Task;
use crate::domain::{ErrorKind, TaskType};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode {task_type} payload: {source}")]
    Encode {
        task_type: TaskType,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode {task_type} payload: {source}")]
    Decode {
        task_type: TaskType,
        #[source]
        source: serde_json::Error,
    },
}

impl CodecError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CodecError::Encode { .. } => ErrorKind::Validation,
            CodecError::Decode { .. } => ErrorKind::Handler,
        }
    }
}

pub struct PayloadCodec;

impl PayloadCodec {
    pub fn encode<T: Task>(task: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(task).map_err(|source| CodecError::Encode {
            task_type: T::TYPE,
            source,
        })
    }

    pub fn decode<T: Task>(content: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(content).map_err(|source| CodecError::Decode {
            task_type: T::TYPE,
            source,
        })
    }
}
