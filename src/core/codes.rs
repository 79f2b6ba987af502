//! Closed code lists of the Verifactu schema (`SuministroInformacion.xsd`).
//!
//! Every list parses through [`std::str::FromStr`], which rejects anything
//! outside the list with [`VerifactuError::InvalidEnumValue`] naming the
//! schema element the code belongs to.

use serde::{Deserialize, Serialize};

use super::error::VerifactuError;

macro_rules! code_list {
    (
        $(#[$meta:meta])*
        $name:ident => $field:literal {
            $( $(#[$vmeta:meta])* $variant:ident = $code:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every member of the list, in schema order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Schema element carrying this code.
            pub const FIELD: &'static str = $field;

            /// Wire code.
            pub fn code(&self) -> &'static str {
                match self {
                    $( Self::$variant => $code ),+
                }
            }

            /// Parse from the wire code.
            pub fn from_code(code: &str) -> Option<Self> {
                match code {
                    $( $code => Some(Self::$variant), )+
                    _ => None,
                }
            }

            /// All wire codes, in schema order.
            pub fn codes() -> Vec<&'static str> {
                Self::ALL.iter().map(|c| c.code()).collect()
            }
        }

        impl std::str::FromStr for $name {
            type Err = VerifactuError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_code(s.trim())
                    .ok_or_else(|| VerifactuError::invalid_code($field, s, &Self::codes()))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.code())
            }
        }
    };
}

code_list! {
    /// L2: invoice type (`TipoFactura`).
    InvoiceType => "TipoFactura" {
        /// F1: invoice (art. 6, 7.2 and 7.3 RD 1619/2012).
        Invoice = "F1",
        /// F2: simplified invoice without recipient identification.
        Simplified = "F2",
        /// F3: invoice issued in substitution of simplified invoices.
        Substitution = "F3",
        /// R1: rectification (art. 80.1, 80.2 and error in law).
        RectificationLegal = "R1",
        /// R2: rectification (art. 80.3, insolvency).
        RectificationInsolvency = "R2",
        /// R3: rectification (art. 80.4, bad debts).
        RectificationBadDebt = "R3",
        /// R4: rectification (other causes).
        RectificationOther = "R4",
        /// R5: rectification of simplified invoices.
        RectificationSimplified = "R5",
    }
}

impl InvoiceType {
    /// R1..R5.
    pub fn is_rectification(&self) -> bool {
        self.code().starts_with('R')
    }

    /// F2 and R5 are issued without a full recipient identification.
    pub fn is_simplified(&self) -> bool {
        matches!(self, Self::Simplified | Self::RectificationSimplified)
    }
}

code_list! {
    /// L3: rectification kind (`TipoRectificativa`).
    RectificationKind => "TipoRectificativa" {
        /// S: substitutive: the rectified amounts replace the original ones.
        Substitutive = "S",
        /// I: by differences: the record carries only the delta.
        Differences = "I",
    }
}

code_list! {
    /// L1: tax (`Impuesto`).
    TaxType => "Impuesto" {
        /// 01: IVA.
        Iva = "01",
        /// 02: IPSI (Ceuta and Melilla).
        Ipsi = "02",
        /// 03: IGIC (Canary Islands).
        Igic = "03",
        /// 05: other.
        Other = "05",
    }
}

code_list! {
    /// L8A: VAT regime key (`ClaveRegimen`).
    RegimeKey => "ClaveRegimen" {
        General = "01",
        Export = "02",
        UsedGoods = "03",
        InvestmentGold = "04",
        TravelAgencies = "05",
        VatGroup = "06",
        CashAccounting = "07",
        IpsiIgic = "08",
        TravelAgencyMediation = "09",
        ThirdPartyCollection = "10",
        PremisesLease = "11",
        PublicWorksPending = "14",
        SuccessiveTract = "15",
        OneStopShop = "17",
        EquivalenceSurcharge = "18",
        Agriculture = "19",
        SimplifiedRegime = "20",
    }
}

code_list! {
    /// L9: qualification of a taxed operation (`CalificacionOperacion`).
    TaxedQualification => "CalificacionOperacion" {
        /// S1: subject and not exempt, no reverse charge.
        Standard = "S1",
        /// S2: subject and not exempt, reverse charge.
        ReverseCharge = "S2",
    }
}

code_list! {
    /// L9: qualification of a non-subject operation (`CalificacionOperacion`).
    NotSubjectQualification => "CalificacionOperacion" {
        /// N1: not subject, art. 7 and 14 and others.
        Article7 = "N1",
        /// N2: not subject by location rules.
        Location = "N2",
    }
}

code_list! {
    /// L10: exemption cause (`OperacionExenta`).
    ExemptionCause => "OperacionExenta" {
        Article20 = "E1",
        Article21 = "E2",
        Article22 = "E3",
        Articles23And24 = "E4",
        Article25 = "E5",
        Other = "E6",
    }
}

code_list! {
    /// L7: identification type for non-NIF parties (`IDType`).
    OtherIdType => "IDType" {
        VatNumber = "02",
        Passport = "03",
        OfficialDocument = "04",
        ResidenceCertificate = "05",
        OtherDocument = "06",
        NotRegistered = "07",
    }
}

code_list! {
    /// L16: who generated a cancellation record (`GeneradoPor`).
    GeneratedBy => "GeneradoPor" {
        /// E: the issuer.
        Issuer = "E",
        /// D: the recipient.
        Recipient = "D",
        /// T: a third party.
        ThirdParty = "T",
    }
}

code_list! {
    /// L12: fingerprint algorithm (`TipoHuella`).
    FingerprintKind => "TipoHuella" {
        /// 01: SHA-256.
        Sha256 = "01",
    }
}

code_list! {
    /// L15: record format version (`IDVersion`).
    IdVersion => "IDVersion" {
        V1_0 = "1.0",
    }
}

impl Default for IdVersion {
    fn default() -> Self {
        Self::V1_0
    }
}
