use serde::Serialize;

/// Brazilian taxpayer identifier flavour, decided by digit count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Individuals, 11 digits
    Cpf,
    /// Legal entities, 14 digits
    Cnpj,
}

/// Normalized CPF/CNPJ: digits only, 11 or 14 of them
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub const CPF_DIGITS: usize = 11;
    pub const CNPJ_DIGITS: usize = 14;

    /// Strip punctuation (`111.444.777-35` → `11144477735`) and check the digit count.
    ///
    /// Returns `None` when the remaining digits are neither a CPF nor a CNPJ.
    pub fn normalize(raw: &str) -> Option<Self> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        match digits.len() {
            Self::CPF_DIGITS | Self::CNPJ_DIGITS => Some(Self(digits)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> DocumentKind {
        if self.0.len() == Self::CPF_DIGITS {
            DocumentKind::Cpf
        } else {
            DocumentKind::Cnpj
        }
    }

    /// Conventional mask: `111.444.777-35` or `11.222.333/0001-81`
    pub fn formatted(&self) -> String {
        let d = &self.0;
        match self.kind() {
            DocumentKind::Cpf => format!("{}.{}.{}-{}", &d[0..3], &d[3..6], &d[6..9], &d[9..11]),
            DocumentKind::Cnpj => format!(
                "{}.{}.{}/{}-{}",
                &d[0..2],
                &d[2..5],
                &d[5..8],
                &d[8..12],
                &d[12..14]
            ),
        }
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
