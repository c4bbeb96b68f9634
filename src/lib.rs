//! Tree maps (minimum spanning tree layouts) of chemical compound libraries.
//!
//! The pipeline reads a compound table, optionally augments it with molecular
//! descriptors and external features, fingerprints every structure, indexes
//! the fingerprints in an LSH forest and lays the resulting minimum spanning
//! tree out in two dimensions. See [`draw_tmap`] for the driver.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

mod parse;
pub use parse::*;

mod morgan;
pub use morgan::*;

mod topology;
pub use topology::*;

mod error;
pub use error::*;

mod registry;
pub use registry::*;

pub mod fingerprint;
pub use fingerprint::Fingerprint;

pub mod descriptors;

mod minhash;
pub use minhash::*;

mod forest;
pub use forest::*;

mod layout;
pub use layout::*;

mod table;
pub use table::*;

mod config;
pub use config::*;

pub mod render;

mod pipeline;
pub use pipeline::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Element {
    H,
    Li,
    B,
    C,
    N,
    O,
    F,
    Na,
    Mg,
    Si,
    P,
    S,
    Cl,
    K,
    Ca,
    Fe,
    Zn,
    As,
    Se,
    Br,
    I,
}

impl Element {
    /// Look up an element by its (capitalized) symbol.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        use Element::*;
        Some(match symbol {
            "H" => H,
            "Li" => Li,
            "B" => B,
            "C" => C,
            "N" => N,
            "O" => O,
            "F" => F,
            "Na" => Na,
            "Mg" => Mg,
            "Si" => Si,
            "P" => P,
            "S" => S,
            "Cl" => Cl,
            "K" => K,
            "Ca" => Ca,
            "Fe" => Fe,
            "Zn" => Zn,
            "As" => As,
            "Se" => Se,
            "Br" => Br,
            "I" => I,
            _ => return None,
        })
    }

    pub fn symbol(&self) -> &'static str {
        use Element::*;
        match self {
            H => "H",
            Li => "Li",
            B => "B",
            C => "C",
            N => "N",
            O => "O",
            F => "F",
            Na => "Na",
            Mg => "Mg",
            Si => "Si",
            P => "P",
            S => "S",
            Cl => "Cl",
            K => "K",
            Ca => "Ca",
            Fe => "Fe",
            Zn => "Zn",
            As => "As",
            Se => "Se",
            Br => "Br",
            I => "I",
        }
    }

    pub fn atomic_number(&self) -> u8 {
        use Element::*;
        match self {
            H => 1,
            Li => 3,
            B => 5,
            C => 6,
            N => 7,
            O => 8,
            F => 9,
            Na => 11,
            Mg => 12,
            Si => 14,
            P => 15,
            S => 16,
            Cl => 17,
            K => 19,
            Ca => 20,
            Fe => 26,
            Zn => 30,
            As => 33,
            Se => 34,
            Br => 35,
            I => 53,
        }
    }

    /// Standard atomic weight in daltons.
    pub fn atomic_mass(&self) -> f64 {
        use Element::*;
        match self {
            H => 1.008,
            Li => 6.94,
            B => 10.81,
            C => 12.011,
            N => 14.007,
            O => 15.999,
            F => 18.998,
            Na => 22.990,
            Mg => 24.305,
            Si => 28.085,
            P => 30.974,
            S => 32.06,
            Cl => 35.45,
            K => 39.098,
            Ca => 40.078,
            Fe => 55.845,
            Zn => 65.38,
            As => 74.922,
            Se => 78.971,
            Br => 79.904,
            I => 126.904,
        }
    }

    /// Valences used to fill implicit hydrogens on organic-subset atoms.
    /// Elements outside the organic subset never receive implicit hydrogens.
    pub fn default_valences(&self) -> &'static [u8] {
        use Element::*;
        match self {
            H | F | Cl | Br | I => &[1],
            B => &[3],
            C | Si => &[4],
            N | P | As => &[3, 5],
            O => &[2],
            S | Se => &[2, 4, 6],
            Li | Na | Mg | K | Ca | Fe | Zn => &[],
        }
    }

    /// Lowest and highest valence of an atom carrying `charge`, from its
    /// valence electrons shifted by the charge: `[N+]` bonds like carbon,
    /// `[O-]` like fluorine. Second-row atoms keep to the octet; heavier
    /// ones may use every valence electron.
    ///
    /// `None` for hydrogen and metals, whose bonding is not checked.
    pub fn charged_valences(&self, charge: i8) -> Option<(u8, u8)> {
        use Element::*;
        let electrons: i16 = match self {
            B => 3,
            C | Si => 4,
            N | P | As => 5,
            O | S | Se => 6,
            F | Cl | Br | I => 7,
            H | Li | Na | Mg | K | Ca | Fe | Zn => return None,
        };
        let electrons = electrons - charge as i16;
        if !(0..=8).contains(&electrons) {
            return Some((0, 0));
        }
        let octet = if electrons <= 4 { electrons } else { 8 - electrons };
        let highest = match self {
            B | C | N | O | F => octet,
            _ if electrons == 8 => octet,
            _ => octet.max(electrons),
        };
        Some((octet as u8, highest as u8))
    }

    /// Covalent radius in angstroms, used for 3-D embedding.
    pub fn covalent_radius(&self) -> f64 {
        use Element::*;
        match self {
            H => 0.31,
            Li => 1.28,
            B => 0.84,
            C => 0.76,
            N => 0.71,
            O => 0.66,
            F => 0.57,
            Na => 1.66,
            Mg => 1.41,
            Si => 1.11,
            P => 1.07,
            S => 1.05,
            Cl => 1.02,
            K => 2.03,
            Ca => 1.76,
            Fe => 1.32,
            Zn => 1.22,
            As => 1.19,
            Se => 1.20,
            Br => 1.20,
            I => 1.39,
        }
    }

    pub fn can_be_aromatic(&self) -> bool {
        matches!(
            self,
            Element::B | Element::C | Element::N | Element::O | Element::P | Element::S | Element::As | Element::Se
        )
    }
}

impl Display for Element {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}", self.symbol())
    }
}

/// A single atom of a molecule graph.
///
/// Hydrogens are normally folded into `hydrogens` rather than stored as
/// nodes; only hydrogens written as bracket atoms (`[H]`) become nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Atom {
    pub element: Element,
    pub aromatic: bool,
    pub charge: i8,
    pub isotope: Option<u16>,
    pub hydrogens: u8,
    /// Written as a bracket atom, so `hydrogens` is explicit and final.
    pub bracket: bool,
}

impl Atom {
    pub fn new(element: Element) -> Self {
        Self {
            element,
            aromatic: false,
            charge: 0,
            isotope: None,
            hydrogens: 0,
            bracket: false,
        }
    }

    pub fn as_aromatic(mut self) -> Self {
        self.aromatic = true;
        self
    }

    pub fn is_carbon(&self) -> bool {
        self.element == Element::C
    }

    pub fn is_hydrogen(&self) -> bool {
        self.element == Element::H
    }

    /// Mass of the atom including its implicit hydrogens.
    pub fn mass(&self) -> f64 {
        self.element.atomic_mass() + self.hydrogens as f64 * Element::H.atomic_mass()
    }

    /// A SMILES-like token describing the atom, e.g. `c`, `[NH3+]`, `C`.
    pub fn smiles_token(&self) -> String {
        let symbol = if self.aromatic {
            self.element.symbol().to_ascii_lowercase()
        } else {
            self.element.symbol().to_string()
        };
        if !self.bracket && self.charge == 0 && self.isotope.is_none() {
            return symbol;
        }
        let mut token = String::from("[");
        if let Some(isotope) = self.isotope {
            token.push_str(&isotope.to_string());
        }
        token.push_str(&symbol);
        match self.hydrogens {
            0 => {}
            1 => token.push('H'),
            n => token.push_str(&format!("H{n}")),
        }
        match self.charge {
            0 => {}
            1 => token.push('+'),
            -1 => token.push('-'),
            c if c > 0 => token.push_str(&format!("+{c}")),
            c => token.push_str(&format!("-{}", -c)),
        }
        token.push(']');
        token
    }
}

impl From<Element> for Atom {
    fn from(element: Element) -> Self {
        Atom::new(element)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bond {
    Single,
    Double,
    Triple,
    Aromatic,
}

impl Bond {
    /// Bond order, with aromatic bonds counted as 1.5.
    pub fn order(&self) -> f64 {
        match self {
            Bond::Single => 1.0,
            Bond::Double => 2.0,
            Bond::Triple => 3.0,
            Bond::Aromatic => 1.5,
        }
    }

    pub fn smiles_symbol(&self) -> &'static str {
        match self {
            Bond::Single => "-",
            Bond::Double => "=",
            Bond::Triple => "#",
            Bond::Aromatic => ":",
        }
    }
}

pub type MoleculeGraph = petgraph::graph::UnGraph<Atom, Bond>;

fn level_filter(level: &str) -> LevelFilter {
    level.parse().unwrap_or(LevelFilter::INFO)
}

/// Install a stderr `tracing` subscriber at the given level.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_logging(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(level_filter(level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Like [`init_logging`], but also mirror every event into `log_file`
/// (truncated on open).
pub fn init_logging_with_file(level: &str, log_file: &Path) -> Result<(), TreemapError> {
    let file = File::create(log_file).map_err(|source| TreemapError::Io {
        path: log_file.to_path_buf(),
        source,
    })?;
    let _ = tracing_subscriber::registry()
        .with(level_filter(level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init();
    Ok(())
}
