pub(crate) mod args;
pub(crate) mod cond;
pub(crate) mod diag;
pub(crate) mod expand;
pub(crate) mod file;
pub(crate) mod scan;
pub(crate) mod table;
pub(crate) mod translator;
