//! Skins shipped with the vanilla game.

pub const VANILLA_SKINS: &[&str] = &[
    "antiantey",
    "beast",
    "blacky",
    "bluekitty",
    "bluestripe",
    "brownbear",
    "cammo",
    "cammostripes",
    "coala",
    "default",
    "limekitty",
    "mouse",
    "pinky",
    "redbopp",
    "redstripe",
    "saddo",
    "toptri",
    "twinbop",
    "twintri",
    "warpaint",
    "x_ninja",
    "x_spec",
];

pub fn is_vanilla(name: &str) -> bool {
    VANILLA_SKINS.binary_search(&name).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_is_sorted_for_binary_search() {
        assert!(VANILLA_SKINS.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn known_names() {
        assert!(is_vanilla("default"));
        assert!(is_vanilla("x_ninja"));
        assert!(!is_vanilla("santa_default"));
        assert!(!is_vanilla("Default"));
    }
}
