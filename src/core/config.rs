mod parsing;
mod settings;
mod types;

pub(crate) use types::{Settings, StorageBackend};

#[cfg(test)]
mod tests;
