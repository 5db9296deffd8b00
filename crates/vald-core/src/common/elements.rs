//! Element and molecule lookup tables shared by the line-list converters.

pub const MAX_SUPPORTED_ATOMIC_NUMBER: usize = 92;

const ELEMENT_SYMBOLS: [&str; MAX_SUPPORTED_ATOMIC_NUMBER] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U",
];

/// SPECTRUM species codes for the diatomic molecules it models.
const MOLECULE_CODES: [(&str, &str); 9] = [
    ("MgH", "112.0"),
    ("TiO", "822.0"),
    ("C2", "606.0"),
    ("H2", "101.0"),
    ("CN", "607.0"),
    ("SiO", "814.0"),
    ("CH", "106.0"),
    ("OH", "608.0"),
    ("SiH", "114.0"),
];

pub fn atomic_number_for_symbol(symbol: &str) -> Option<usize> {
    let normalized = symbol.trim();
    if normalized.is_empty() {
        return None;
    }

    // VALD symbols are case-sensitive: "CO" is a molecule, "Co" is cobalt.
    ELEMENT_SYMBOLS
        .iter()
        .position(|candidate| *candidate == normalized)
        .map(|index| index + 1)
}

pub fn molecule_code(symbol: &str) -> Option<&'static str> {
    let normalized = symbol.trim();
    MOLECULE_CODES
        .iter()
        .find(|(candidate, _)| *candidate == normalized)
        .map(|(_, code)| *code)
}

#[cfg(test)]
mod tests {
    use super::{atomic_number_for_symbol, molecule_code};

    #[test]
    fn symbol_lookup_matches_atomic_number() {
        assert_eq!(atomic_number_for_symbol("Fe"), Some(26));
        assert_eq!(atomic_number_for_symbol(" U "), Some(92));
        assert_eq!(atomic_number_for_symbol("Np"), None);
        assert_eq!(atomic_number_for_symbol(""), None);
    }

    #[test]
    fn symbol_lookup_is_case_sensitive() {
        assert_eq!(atomic_number_for_symbol("Co"), Some(27));
        assert_eq!(atomic_number_for_symbol("CO"), None);
        assert_eq!(atomic_number_for_symbol("fe"), None);
    }

    #[test]
    fn molecule_codes_cover_spectrum_molecules() {
        assert_eq!(molecule_code("CN"), Some("607.0"));
        assert_eq!(molecule_code("TiO"), Some("822.0"));
        assert_eq!(molecule_code("CO"), None);
    }
}
