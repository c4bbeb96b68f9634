mod smiles;
pub use smiles::*;

mod bracket;
pub use bracket::*;
