pub(crate) mod support;

mod registry_unit;
