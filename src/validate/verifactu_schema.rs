//! Content models of `RegistroAlta` and `RegistroAnulacion`
//! (`SuministroInformacion.xsd`, version 1.0).

use std::sync::OnceLock;

use super::schema::*;
use crate::xml::ns;

const SUM1: &str = ns::SUM1;

const IMPORTE_TYPE: &str = "{https://www2.agenciatributaria.gob.es/static_files/common/internet/dep/aplicaciones/es/aeat/tike/cont/ws/SuministroInformacion.xsd}ImporteSgn12.2Type";
const TIPO_TYPE: &str = "{https://www2.agenciatributaria.gob.es/static_files/common/internet/dep/aplicaciones/es/aeat/tike/cont/ws/SuministroInformacion.xsd}Tipo2.2Type";

const SN: &[&str] = &["S", "N"];

fn s(name: &'static str, ty: SimpleType) -> ElementDecl {
    ElementDecl::simple(SUM1, name, ty)
}

fn c(name: &'static str, particle: Particle) -> ElementDecl {
    ElementDecl::complex(SUM1, name, particle)
}

fn text(min_len: usize, max_len: usize) -> SimpleType {
    SimpleType::Text { min_len, max_len }
}

fn importe() -> SimpleType {
    SimpleType::Decimal {
        type_name: IMPORTE_TYPE,
        int_digits: 12,
        frac_digits: 2,
        signed: true,
    }
}

fn tipo() -> SimpleType {
    SimpleType::Decimal {
        type_name: TIPO_TYPE,
        int_digits: 3,
        frac_digits: 2,
        signed: false,
    }
}

fn nif() -> ElementDecl {
    s("NIF", text(9, 9))
}

fn id_otro() -> ElementDecl {
    c(
        "IDOtro",
        Particle::seq(vec![
            Particle::opt(s("CodigoPais", text(2, 2))),
            Particle::one(s(
                "IDType",
                SimpleType::Enumeration(&["02", "03", "04", "05", "06", "07"]),
            )),
            Particle::one(s("ID", text(1, 20))),
        ]),
    )
}

fn nif_or_other() -> Particle {
    Particle::choice(vec![Particle::one(nif()), Particle::one(id_otro())])
}

fn persona(name: &'static str) -> ElementDecl {
    c(
        name,
        Particle::seq(vec![
            Particle::one(s("NombreRazon", text(1, 120))),
            nif_or_other(),
        ]),
    )
}

fn invoice_ref(name: &'static str) -> ElementDecl {
    c(
        name,
        Particle::seq(vec![
            Particle::one(s("IDEmisorFactura", text(9, 9))),
            Particle::one(s("NumSerieFactura", text(1, 60))),
            Particle::one(s("FechaExpedicionFactura", SimpleType::Date)),
        ]),
    )
}

fn detalle_desglose() -> ElementDecl {
    c(
        "DetalleDesglose",
        Particle::seq(vec![
            Particle::opt(s(
                "Impuesto",
                SimpleType::Enumeration(&["01", "02", "03", "05"]),
            )),
            Particle::opt(s(
                "ClaveRegimen",
                SimpleType::Enumeration(&[
                    "01", "02", "03", "04", "05", "06", "07", "08", "09", "10", "11", "14",
                    "15", "17", "18", "19", "20",
                ]),
            )),
            Particle::choice(vec![
                Particle::one(s(
                    "CalificacionOperacion",
                    SimpleType::Enumeration(&["S1", "S2", "N1", "N2"]),
                )),
                Particle::one(s(
                    "OperacionExenta",
                    SimpleType::Enumeration(&["E1", "E2", "E3", "E4", "E5", "E6"]),
                )),
            ]),
            Particle::opt(s("TipoImpositivo", tipo())),
            Particle::one(s("BaseImponibleOimporteNoSujeto", importe())),
            Particle::opt(s("BaseImponibleACoste", importe())),
            Particle::opt(s("CuotaRepercutida", importe())),
            Particle::opt(s("TipoRecargoEquivalencia", tipo())),
            Particle::opt(s("CuotaRecargoEquivalencia", importe())),
        ]),
    )
}

fn encadenamiento() -> ElementDecl {
    c(
        "Encadenamiento",
        Particle::choice(vec![
            Particle::one(s("PrimerRegistro", SimpleType::Enumeration(&["S"]))),
            Particle::one(c(
                "RegistroAnterior",
                Particle::seq(vec![
                    Particle::one(s("IDEmisorFactura", text(9, 9))),
                    Particle::one(s("NumSerieFactura", text(1, 60))),
                    Particle::one(s("FechaExpedicionFactura", SimpleType::Date)),
                    Particle::one(s("Huella", text(1, 64))),
                ]),
            )),
        ]),
    )
}

fn sistema_informatico() -> ElementDecl {
    c(
        "SistemaInformatico",
        Particle::seq(vec![
            Particle::one(s("NombreRazon", text(1, 120))),
            nif_or_other(),
            Particle::one(s("NombreSistemaInformatico", text(1, 30))),
            Particle::one(s("IdSistemaInformatico", text(2, 2))),
            Particle::one(s("Version", text(1, 50))),
            Particle::one(s("NumeroInstalacion", text(1, 100))),
            Particle::one(s("TipoUsoPosibleSoloVerifactu", SimpleType::Enumeration(SN))),
            Particle::one(s("TipoUsoPosibleMultiOT", SimpleType::Enumeration(SN))),
            Particle::one(s("IndicadorMultiplesOT", SimpleType::Enumeration(SN))),
        ]),
    )
}

/// Elements closing both record kinds.
fn trailer() -> Vec<Particle> {
    vec![
        Particle::one(encadenamiento()),
        Particle::one(sistema_informatico()),
        Particle::one(s("FechaHoraHusoGenRegistro", SimpleType::DateTime)),
        Particle::one(s("TipoHuella", SimpleType::Enumeration(&["01"]))),
        Particle::one(s("Huella", text(1, 64))),
        Particle::opt(ElementDecl::any(ns::DS, "Signature")),
    ]
}

fn registro_alta() -> ElementDecl {
    let mut items = vec![
        Particle::one(s("IDVersion", SimpleType::Enumeration(&["1.0"]))),
        Particle::one(c(
            "IDFactura",
            Particle::seq(vec![
                Particle::one(s("IDEmisorFactura", text(9, 9))),
                Particle::one(s("NumSerieFactura", text(1, 60))),
                Particle::one(s("FechaExpedicionFactura", SimpleType::Date)),
            ]),
        )),
        Particle::opt(s("RefExterna", text(1, 60))),
        Particle::one(s("NombreRazonEmisor", text(1, 120))),
        Particle::opt(s("Subsanacion", SimpleType::Enumeration(SN))),
        Particle::opt(s("RechazoPrevio", SimpleType::Enumeration(&["N", "S", "X"]))),
        Particle::one(s(
            "TipoFactura",
            SimpleType::Enumeration(&["F1", "F2", "F3", "R1", "R2", "R3", "R4", "R5"]),
        )),
        Particle::opt(s("TipoRectificativa", SimpleType::Enumeration(&["S", "I"]))),
        Particle::opt(c(
            "FacturasRectificadas",
            Particle::many(invoice_ref("IDFacturaRectificada"), 1, 1000),
        )),
        Particle::opt(c(
            "FacturasSustituidas",
            Particle::many(invoice_ref("IDFacturaSustituida"), 1, 1000),
        )),
        Particle::opt(c(
            "ImporteRectificacion",
            Particle::seq(vec![
                Particle::one(s("BaseRectificada", importe())),
                Particle::one(s("CuotaRectificada", importe())),
                Particle::opt(s("CuotaRecargoRectificado", importe())),
            ]),
        )),
        Particle::opt(s("FechaOperacion", SimpleType::Date)),
        Particle::one(s("DescripcionOperacion", text(1, 500))),
        Particle::opt(s("FacturaSimplificadaArt7273", SimpleType::Enumeration(SN))),
        Particle::opt(s(
            "FacturaSinIdentifDestinatarioArt61d",
            SimpleType::Enumeration(SN),
        )),
        Particle::opt(s("Macrodato", SimpleType::Enumeration(SN))),
        Particle::opt(c(
            "Destinatarios",
            Particle::many(persona("IDDestinatario"), 1, 1000),
        )),
        Particle::one(c("Desglose", Particle::many(detalle_desglose(), 1, 12))),
        Particle::one(s("CuotaTotal", importe())),
        Particle::one(s("ImporteTotal", importe())),
    ];
    items.extend(trailer());
    c("RegistroAlta", Particle::seq(items))
}

fn registro_anulacion() -> ElementDecl {
    let mut items = vec![
        Particle::one(s("IDVersion", SimpleType::Enumeration(&["1.0"]))),
        Particle::one(c(
            "IDFactura",
            Particle::seq(vec![
                Particle::one(s("IDEmisorFacturaAnulada", text(9, 9))),
                Particle::one(s("NumSerieFacturaAnulada", text(1, 60))),
                Particle::one(s("FechaExpedicionFacturaAnulada", SimpleType::Date)),
            ]),
        )),
        Particle::opt(s("RefExterna", text(1, 60))),
        Particle::opt(s("SinRegistroPrevio", SimpleType::Enumeration(SN))),
        Particle::opt(s("RechazoPrevio", SimpleType::Enumeration(SN))),
        Particle::opt(s("GeneradoPor", SimpleType::Enumeration(&["E", "D", "T"]))),
        Particle::opt(persona("Generador")),
    ];
    items.extend(trailer());
    c("RegistroAnulacion", Particle::seq(items))
}

/// Schema with `RegistroAlta` and `RegistroAnulacion` as roots, built once.
pub fn verifactu_schema() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| Schema {
        roots: vec![registro_alta(), registro_anulacion()],
    })
}
