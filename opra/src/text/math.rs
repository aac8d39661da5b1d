//! Spoken equivalents for math notation.

/// LaTeX macro names (without the backslash) and their spoken phrases.
pub(super) const LATEX_COMMANDS: &[(&str, &str)] = &[
    ("frac", "fraction"),
    ("sqrt", "square root of"),
    ("sum", "sum"),
    ("prod", "product"),
    ("int", "integral"),
    ("lim", "limit"),
    ("infty", "infinity"),
    ("times", "times"),
    ("div", "divided by"),
    ("pm", "plus or minus"),
    ("mp", "minus or plus"),
    ("leq", "less than or equal to"),
    ("geq", "greater than or equal to"),
    ("neq", "not equal to"),
    ("approx", "approximately equal to"),
    ("equiv", "equivalent to"),
    ("propto", "proportional to"),
    ("in", "in"),
    ("notin", "not in"),
    ("subset", "subset of"),
    ("supset", "superset of"),
    ("cup", "union"),
    ("cap", "intersection"),
    ("emptyset", "empty set"),
    ("forall", "for all"),
    ("exists", "there exists"),
    ("rightarrow", "implies"),
    ("leftarrow", "implied by"),
    ("leftrightarrow", "if and only if"),
    // Greek
    ("alpha", "alpha"),
    ("beta", "beta"),
    ("gamma", "gamma"),
    ("delta", "delta"),
    ("epsilon", "epsilon"),
    ("varepsilon", "epsilon"),
    ("zeta", "zeta"),
    ("eta", "eta"),
    ("theta", "theta"),
    ("vartheta", "theta"),
    ("iota", "iota"),
    ("kappa", "kappa"),
    ("lambda", "lambda"),
    ("mu", "mu"),
    ("nu", "nu"),
    ("xi", "xi"),
    ("omicron", "omicron"),
    ("pi", "pi"),
    ("rho", "rho"),
    ("sigma", "sigma"),
    ("tau", "tau"),
    ("upsilon", "upsilon"),
    ("phi", "phi"),
    ("varphi", "phi"),
    ("chi", "chi"),
    ("psi", "psi"),
    ("omega", "omega"),
];

/// Unicode math symbols and their spoken phrases.
pub(super) const UNICODE_SYMBOLS: &[(char, &str)] = &[
    ('\u{2211}', "sum"),                      // ∑
    ('\u{220F}', "product"),                  // ∏
    ('\u{222B}', "integral"),                 // ∫
    ('\u{221A}', "square root of"),           // √
    ('\u{221E}', "infinity"),                 // ∞
    ('\u{00D7}', "times"),                    // ×
    ('\u{00F7}', "divided by"),               // ÷
    ('\u{00B1}', "plus or minus"),            // ±
    ('\u{2213}', "minus or plus"),            // ∓
    ('\u{2264}', "less than or equal to"),    // ≤
    ('\u{2265}', "greater than or equal to"), // ≥
    ('\u{2260}', "not equal to"),             // ≠
    ('\u{2248}', "approximately equal to"),   // ≈
    ('\u{2261}', "equivalent to"),            // ≡
    ('\u{221D}', "proportional to"),          // ∝
    ('\u{2208}', "in"),                       // ∈
    ('\u{2209}', "not in"),                   // ∉
    ('\u{2282}', "subset of"),                // ⊂
    ('\u{2283}', "superset of"),              // ⊃
    ('\u{222A}', "union"),                    // ∪
    ('\u{2229}', "intersection"),             // ∩
    ('\u{2205}', "empty set"),                // ∅
    ('\u{2200}', "for all"),                  // ∀
    ('\u{2203}', "there exists"),             // ∃
    ('\u{2192}', "implies"),                  // →
    ('\u{2190}', "implied by"),               // ←
    ('\u{2194}', "if and only if"),           // ↔
    ('\u{03B1}', "alpha"),
    ('\u{03B2}', "beta"),
    ('\u{03B3}', "gamma"),
    ('\u{03B4}', "delta"),
    ('\u{03B5}', "epsilon"),
    ('\u{03F5}', "epsilon"),
    ('\u{03B6}', "zeta"),
    ('\u{03B7}', "eta"),
    ('\u{03B8}', "theta"),
    ('\u{03B9}', "iota"),
    ('\u{03BA}', "kappa"),
    ('\u{03BB}', "lambda"),
    ('\u{03BC}', "mu"),
    ('\u{03BD}', "nu"),
    ('\u{03BE}', "xi"),
    ('\u{03BF}', "omicron"),
    ('\u{03C0}', "pi"),
    ('\u{03C1}', "rho"),
    ('\u{03C2}', "sigma"), // final sigma
    ('\u{03C3}', "sigma"),
    ('\u{03C4}', "tau"),
    ('\u{03C5}', "upsilon"),
    ('\u{03C6}', "phi"),
    ('\u{03D5}', "phi"),
    ('\u{03C7}', "chi"),
    ('\u{03C8}', "psi"),
    ('\u{03C9}', "omega"),
];

/// Spoken phrase for a LaTeX macro name.
pub(super) fn latex_phrase(name: &str) -> Option<&'static str> {
    LATEX_COMMANDS
        .iter()
        .find(|(command, _)| *command == name)
        .map(|(_, phrase)| *phrase)
}

/// Spoken phrase for a Unicode math symbol.
pub(super) fn symbol_phrase(c: char) -> Option<&'static str> {
    UNICODE_SYMBOLS
        .iter()
        .find(|(symbol, _)| *symbol == c)
        .map(|(_, phrase)| *phrase)
}
