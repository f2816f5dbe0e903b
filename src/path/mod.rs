//! Path values: store-independent [`PurePath`], store-bound [`FakePath`] and the
//! [`FakePathlib`] factory tying them to one store.

mod fake;
mod module;
mod pure;

pub use fake::{FakePath, PathScope};
pub use module::FakePathlib;
pub use pure::{Parents, PurePath};
