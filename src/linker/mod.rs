pub mod declarations;

pub use declarations::{DeclarationResolution, DeclarationStats};

pub mod overrides;
pub use overrides::OverrideGraph;
