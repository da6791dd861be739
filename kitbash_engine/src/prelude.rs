pub use anyhow::{anyhow, bail, Context, Result};

pub use itertools::Itertools;
pub use std::collections::{HashMap, HashSet};
pub use std::rc::Rc;

pub use kitbash_commons::utils::*;
