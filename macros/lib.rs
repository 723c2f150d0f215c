pub use testing::{type_parameterized_test, value_parameterized_test};
