//! Built-in operations and the default registry

pub mod builtin;

use crate::core::OperationRegistry;

/// Registry holding every built-in operation
pub fn builtin_registry() -> OperationRegistry {
    let mut registry = OperationRegistry::new();
    registry
        .register_operation("constant", builtin::constant)
        .register_operation("echo", builtin::echo)
        .register_operation("template", builtin::template)
        .register_operation("delay", builtin::delay)
        .register_operation("fail", builtin::fail);
    registry
}
