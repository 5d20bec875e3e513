//! TypedRegistry - Handler の登録と管理
//!
//! # 学習ポイント
//! - HashMap での型消去された trait object の管理
//! - Generic methods での登録と型安全性
//! - Arc による共有所有権

use crate::typed::handler::TypedHandler;

use super::handler::{DynHandler, Handler};
use super::task::Task;
use crate::domain::TaskType;
use std::collections::HashMap;
use std::sync::Arc;

/// TypedRegistry は TaskType ごとに 1 つの Handler を保持
///
/// ```ignore
/// let mut registry = TypedRegistry::new();
/// registry.register::<AutoPublishTask, _>(handler)?;
/// let workers = registry.into_handlers(); // [(TaskType, Arc<dyn DynHandler>)]
/// ```
#[derive(Default)]
pub struct TypedRegistry {
    handlers: HashMap<TaskType, Arc<dyn DynHandler>>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("handler for task type '{0}' is already registered")]
    AlreadyRegistered(TaskType),
}

impl TypedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Task, H: Handler<T> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), RegistryError> {
        if self.handlers.contains_key(&T::TYPE) {
            return Err(RegistryError::AlreadyRegistered(T::TYPE));
        }
        self.handlers
            .insert(T::TYPE, Arc::new(TypedHandler::<T, H>::new(handler)));
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn get(&self, task_type: TaskType) -> Option<Arc<dyn DynHandler>> {
        self.handlers.get(&task_type).cloned()
    }

    /// 登録済みの TaskType（順序は TaskType の Ord）
    pub fn registered_types(&self) -> Vec<TaskType> {
        let mut types: Vec<TaskType> = self.handlers.keys().copied().collect();
        types.sort();
        types
    }

    pub fn into_handlers(self) -> Vec<(TaskType, Arc<dyn DynHandler>)> {
        let mut handlers: Vec<_> = self.handlers.into_iter().collect();
        handlers.sort_by_key(|(task_type, _)| *task_type);
        handlers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::handler::fixtures::{OtherSampleHandler, SampleHandler};
    use crate::typed::task::fixtures::{OtherSampleTask, SampleTask};

    #[test]
    fn register_and_get() {
        let mut registry = TypedRegistry::new();
        registry.register::<SampleTask, _>(SampleHandler).unwrap();

        let retrieved = registry.get(SampleTask::TYPE).unwrap();
        assert_eq!(retrieved.task_type(), TaskType::GameAutoPublish);
        assert!(registry.get(OtherSampleTask::TYPE).is_none());
    }

    #[test]
    fn double_registration_is_rejected() {
        let mut registry = TypedRegistry::new();
        registry.register::<SampleTask, _>(SampleHandler).unwrap();
        let result = registry.register::<SampleTask, _>(SampleHandler);
        assert_eq!(
            result,
            Err(RegistryError::AlreadyRegistered(TaskType::GameAutoPublish))
        );
    }

    #[test]
    fn registered_types_are_sorted() {
        let mut registry = TypedRegistry::new();
        registry
            .register::<OtherSampleTask, _>(OtherSampleHandler)
            .unwrap();
        registry.register::<SampleTask, _>(SampleHandler).unwrap();

        assert_eq!(
            registry.registered_types(),
            vec![TaskType::GameAutoPublish, TaskType::GameNotifyReservedUsers]
        );
        let handlers = registry.into_handlers();
        assert_eq!(handlers.len(), 2);
        assert_eq!(handlers[1].1.task_type(), TaskType::GameNotifyReservedUsers);
    }
}
