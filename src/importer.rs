use std::collections::HashMap;
use std::path::Path;

use rusqlite::types::Value;
use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::dates::parse_date;
use crate::error::{InventaireError, Result};
use crate::models::{EnrollmentStatus, RecordKind};
use crate::registry::{find_course_by_name, find_student_by_name};
use crate::store::{
    coerce_bool, coerce_quantity, enrollment_exists, insert_enrollment, insert_expense,
    insert_payment, insert_service, parse_amount_text, text_value, NewEnrollment, NewExpense,
    NewPayment, NewService,
};

// ---------------------------------------------------------------------------
// Column aliases
// ---------------------------------------------------------------------------

// Header names are matched after trimming and lowercasing, so camelCase
// exports (`enrollmentPrice`) match their lowercased alias.
const STUDENT: &[&str] = &["student", "student_name", "etudiant", "étudiant", "nom_etudiant"];
const COURSE: &[&str] = &["course", "course_name", "logiciel", "formation"];
const STATUS: &[&str] = &["status", "statut"];
const ENROLLMENT_PRICE: &[&str] = &["enrollmentprice", "enrollment_price", "price", "prix_inscription"];
const ENROLLMENT_DATE: &[&str] = &["enrollmentdate", "enrollment_date", "enrolled_on", "date_inscription", "date"];

const ENROLLMENT_ID: &[&str] = &["enrollmentid", "enrollment_id", "inscription_id"];
const AMOUNT_TOTAL: &[&str] = &["amounttotal", "amount_total", "montant_total"];
const AMOUNT_PAID: &[&str] = &["amountpaid", "amount_paid", "montant_paye", "montant_payé"];
const SETTLED: &[&str] = &["issettled", "is_settled", "settled", "est_solde"];
const CREATION_DATE: &[&str] = &["creationdate", "creation_date", "created_on", "date_creation", "date"];

const EXPENSE_NAME: &[&str] = &["name", "nom_depense", "nom"];
const REASON: &[&str] = &["reason", "motif"];
const EXPENSE_SUM: &[&str] = &["sum", "amount", "somme", "montant"];

const SERVICE_NAME: &[&str] = &["name", "service", "nom_prestation"];
const CLIENT: &[&str] = &["client", "nom_client"];
const PHONE: &[&str] = &["phone", "telephone", "téléphone"];
const UNIT_PRICE: &[&str] = &["unitprice", "unit_price", "prix_unitaire", "prix"];
const QUANTITY: &[&str] = &["quantity", "qty", "quantite", "quantité"];
const SERVICE_DATE: &[&str] = &["servicedate", "service_date", "date_prestation", "date"];

/// The column that carries a kind's amount; a file without it is rejected.
fn required_amount(kind: RecordKind) -> &'static [&'static str] {
    match kind {
        RecordKind::Enrollment => ENROLLMENT_PRICE,
        RecordKind::Payment => AMOUNT_PAID,
        RecordKind::Expense => EXPENSE_SUM,
        RecordKind::Service => UNIT_PRICE,
    }
}

struct Columns {
    index: HashMap<String, usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().trim_start_matches('\u{feff}').to_lowercase(), i))
            .collect();
        Self { index }
    }

    fn find(&self, aliases: &[&str]) -> Option<usize> {
        aliases.iter().find_map(|a| self.index.get(*a).copied())
    }

    fn get<'r>(&self, record: &'r csv::StringRecord, aliases: &[&str]) -> Option<&'r str> {
        self.find(aliases)
            .and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Amounts are stored as numbers when they parse and as raw text otherwise,
/// so the fetch boundary still sees what the file said.
fn amount_value(raw: Option<&str>) -> Value {
    match raw {
        Some(s) => match parse_amount_text(s) {
            Some(n) => Value::Real(n),
            None => Value::Text(s.to_string()),
        },
        None => Value::Null,
    }
}

/// Semicolon-separated exports (decimal-comma locales) are detected from the header line.
fn sniff_delimiter(file_path: &Path) -> Result<u8> {
    let data = std::fs::read(file_path)?;
    let header = data.split(|&b| b == b'\n').next().unwrap_or(&[]);
    let count = |sep: u8| header.iter().filter(|&&b| b == sep).count();
    if count(b';') > count(b',') {
        Ok(b';')
    } else {
        Ok(b',')
    }
}

fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

// ---------------------------------------------------------------------------
// import_file
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ImportResult {
    pub imported: usize,
    pub duplicate_file: bool,
    pub warnings: Vec<String>,
}

pub fn import_file(conn: &Connection, file_path: &Path, kind: RecordKind) -> Result<ImportResult> {
    let checksum = compute_checksum(file_path)?;
    {
        let mut stmt = conn.prepare("SELECT 1 FROM imports WHERE checksum = ?1 AND kind = ?2")?;
        if stmt.exists(rusqlite::params![checksum, kind.key()])? {
            return Ok(ImportResult {
                duplicate_file: true,
                ..ImportResult::default()
            });
        }
    }

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(file_path)?)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(file_path)?;
    let columns = Columns::from_headers(rdr.headers()?);
    let amount_aliases = required_amount(kind);
    if columns.find(amount_aliases).is_none() {
        return Err(InventaireError::MissingColumn {
            kind: kind.key().to_string(),
            expected: amount_aliases.join(", "),
        });
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO imports (filename, kind, checksum) VALUES (?1, ?2, ?3)",
        rusqlite::params![
            file_path.file_name().and_then(|n| n.to_str()).unwrap_or(""),
            kind.key(),
            checksum,
        ],
    )?;
    let import_id = tx.last_insert_rowid();

    let mut result = ImportResult::default();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        // Header is line 1.
        let line = i + 2;
        match kind {
            RecordKind::Enrollment => import_enrollment(&tx, &columns, &record, import_id, line, &mut result)?,
            RecordKind::Payment => import_payment(&tx, &columns, &record, import_id, line, &mut result)?,
            RecordKind::Expense => import_expense(&tx, &columns, &record, import_id, line, &mut result)?,
            RecordKind::Service => import_service(&tx, &columns, &record, import_id, line, &mut result)?,
        }
        result.imported += 1;
    }

    tx.execute(
        "UPDATE imports SET record_count = ?1 WHERE id = ?2",
        rusqlite::params![result.imported as i64, import_id],
    )?;
    tx.commit()?;
    Ok(result)
}

fn check_date(raw: Option<&str>, line: usize, result: &mut ImportResult) {
    if let Some(s) = raw {
        if parse_date(s).is_none() {
            result
                .warnings
                .push(format!("line {line}: unreadable date '{s}', row kept without a month"));
        }
    }
}

fn import_enrollment(
    conn: &Connection,
    cols: &Columns,
    record: &csv::StringRecord,
    import_id: i64,
    line: usize,
    result: &mut ImportResult,
) -> Result<()> {
    let date = cols.get(record, ENROLLMENT_DATE);
    check_date(date, line, result);
    let student = cols.get(record, STUDENT).unwrap_or_default().to_string();
    let course = cols.get(record, COURSE).map(str::to_string);
    // Names that match exactly one registry row are linked to it.
    let course_id = match course.as_deref() {
        Some(name) => find_course_by_name(conn, name)?,
        None => None,
    };
    let row = NewEnrollment {
        student_id: find_student_by_name(conn, &student)?,
        course_id,
        student,
        course,
        status: EnrollmentStatus::parse_lenient(cols.get(record, STATUS).unwrap_or("")),
        price: amount_value(cols.get(record, ENROLLMENT_PRICE)),
        enrolled_on: text_value(date),
    };
    insert_enrollment(conn, &row, Some(import_id))?;
    Ok(())
}

fn import_payment(
    conn: &Connection,
    cols: &Columns,
    record: &csv::StringRecord,
    import_id: i64,
    line: usize,
    result: &mut ImportResult,
) -> Result<()> {
    let date = cols.get(record, CREATION_DATE);
    check_date(date, line, result);

    let mut enrollment_id = None;
    if let Some(raw) = cols.get(record, ENROLLMENT_ID) {
        match raw.parse::<i64>() {
            Ok(id) if enrollment_exists(conn, id)? => enrollment_id = Some(id),
            _ => result
                .warnings
                .push(format!("line {line}: unknown enrollment '{raw}', payment left unlinked")),
        }
    }

    let settled = cols
        .get(record, SETTLED)
        .map(|s| coerce_bool(&Value::Text(s.to_string())))
        .unwrap_or(false);
    let row = NewPayment {
        enrollment_id,
        amount_total: amount_value(cols.get(record, AMOUNT_TOTAL)),
        amount_paid: amount_value(cols.get(record, AMOUNT_PAID)),
        is_settled: settled,
        created_on: text_value(date),
    };
    insert_payment(conn, &row, Some(import_id))?;
    Ok(())
}

fn import_expense(
    conn: &Connection,
    cols: &Columns,
    record: &csv::StringRecord,
    import_id: i64,
    line: usize,
    result: &mut ImportResult,
) -> Result<()> {
    let date = cols.get(record, CREATION_DATE);
    check_date(date, line, result);
    let row = NewExpense {
        name: cols.get(record, EXPENSE_NAME).unwrap_or_default().to_string(),
        reason: cols.get(record, REASON).map(str::to_string),
        amount: amount_value(cols.get(record, EXPENSE_SUM)),
        created_on: text_value(date),
    };
    insert_expense(conn, &row, Some(import_id))?;
    Ok(())
}

fn import_service(
    conn: &Connection,
    cols: &Columns,
    record: &csv::StringRecord,
    import_id: i64,
    line: usize,
    result: &mut ImportResult,
) -> Result<()> {
    let date = cols.get(record, SERVICE_DATE);
    check_date(date, line, result);

    let quantity = amount_value(cols.get(record, QUANTITY));
    if coerce_quantity(&quantity).is_none() {
        result
            .warnings
            .push(format!("line {line}: missing or fractional quantity, service counts as 0"));
    }
    let row = NewService {
        name: cols.get(record, SERVICE_NAME).unwrap_or_default().to_string(),
        client: cols.get(record, CLIENT).unwrap_or_default().to_string(),
        phone: cols.get(record, PHONE).map(str::to_string),
        unit_price: amount_value(cols.get(record, UNIT_PRICE)),
        quantity,
        service_date: text_value(date),
    };
    insert_service(conn, &row, Some(import_id))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{build_inventory, MonthOrder};
    use crate::db::{get_connection, init_db};
    use crate::store::{fetch_payments, fetch_records, fetch_services};

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn write_csv(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_import_french_headers() {
        let (dir, conn) = test_db();
        let path = write_csv(
            dir.path(),
            "inscriptions.csv",
            "etudiant,logiciel,statut,prix_inscription,date_inscription\n\
             Mamadou Diallo,AutoCAD,inscrit,1500000,2024-09-15\n\
             Fatoumata Camara,Excel,termine,\"900 000\",2024-10-02\n",
        );
        let result = import_file(&conn, &path, RecordKind::Enrollment).unwrap();
        assert_eq!(result.imported, 2);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);

        let records = fetch_records(&conn).unwrap();
        assert_eq!(records.enrollments[1].price, 900_000.0);
        assert_eq!(records.enrollments[1].status, EnrollmentStatus::Completed);
    }

    #[test]
    fn test_import_links_enrollments_to_registry() {
        let (dir, conn) = test_db();
        let student = crate::registry::insert_student(
            &conn,
            &crate::registry::NewStudent {
                matricule: None,
                last_name: "Diallo".into(),
                first_name: "Mamadou".into(),
                email: None,
                phone: None,
                address: None,
                status: crate::models::StudentStatus::Active,
                registered_on: Value::Null,
            },
        )
        .unwrap();
        let course = crate::registry::insert_course(
            &conn,
            &crate::registry::NewCourse {
                code: Some("ACAD".into()),
                name: "AutoCAD".into(),
                description: None,
                duration: None,
                price: Value::Real(1_500_000.0),
            },
        )
        .unwrap();
        let path = write_csv(
            dir.path(),
            "inscriptions.csv",
            "etudiant,logiciel,prix_inscription,date_inscription\n\
             mamadou diallo,acad,1500000,2024-09-15\n\
             Hawa Soumah,Photoshop,1200000,2024-09-16\n",
        );
        import_file(&conn, &path, RecordKind::Enrollment).unwrap();

        let enrollments = fetch_records(&conn).unwrap().enrollments;
        assert_eq!(enrollments[0].student_id, Some(student));
        assert_eq!(enrollments[0].course_id, Some(course));
        assert_eq!(enrollments[0].student, "Mamadou Diallo");
        assert_eq!(enrollments[0].course.as_deref(), Some("AutoCAD"));
        assert_eq!(enrollments[1].student_id, None);
        assert_eq!(enrollments[1].course.as_deref(), Some("Photoshop"));
    }

    #[test]
    fn test_import_camel_case_headers() {
        let (dir, conn) = test_db();
        let path = write_csv(
            dir.path(),
            "payments.csv",
            "amountPaid,creationDate,isSettled\n800000,2024-09-20,true\n500000,2024-10-01,false\n",
        );
        let result = import_file(&conn, &path, RecordKind::Payment).unwrap();
        assert_eq!(result.imported, 2);
        let payments = fetch_payments(&conn).unwrap();
        assert!(payments[0].is_settled);
        assert!(!payments[1].is_settled);
    }

    #[test]
    fn test_import_detects_duplicate_file() {
        let (dir, conn) = test_db();
        let path = write_csv(dir.path(), "depenses.csv", "nom_depense,motif,somme,date_creation\nLoyer,Octobre,200000,2024-09-25\n");
        let r1 = import_file(&conn, &path, RecordKind::Expense).unwrap();
        assert_eq!(r1.imported, 1);
        let r2 = import_file(&conn, &path, RecordKind::Expense).unwrap();
        assert!(r2.duplicate_file);
        assert_eq!(r2.imported, 0);
        let count: i64 = conn.query_row("SELECT count(*) FROM expenses", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
        let record_count: i64 = conn
            .query_row("SELECT record_count FROM imports LIMIT 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(record_count, 1);
    }

    #[test]
    fn test_import_rejects_missing_amount_column() {
        let (dir, conn) = test_db();
        let path = write_csv(dir.path(), "bad.csv", "nom,date\nLoyer,2024-01-01\n");
        let err = import_file(&conn, &path, RecordKind::Expense).unwrap_err();
        assert!(matches!(err, InventaireError::MissingColumn { .. }), "got: {err}");
        let imports: i64 = conn.query_row("SELECT count(*) FROM imports", [], |r| r.get(0)).unwrap();
        assert_eq!(imports, 0);
    }

    #[test]
    fn test_import_warns_on_dirty_rows_but_keeps_them() {
        let (dir, conn) = test_db();
        let path = write_csv(
            dir.path(),
            "prestations.csv",
            "nom_prestation,nom_client,prix,quantite,date_prestation\n\
             Maintenance,Orange,5000,3,2024-05-10\n\
             Installation,MTN,10000,,bientot\n",
        );
        let result = import_file(&conn, &path, RecordKind::Service).unwrap();
        assert_eq!(result.imported, 2);
        assert_eq!(result.warnings.len(), 2, "{:?}", result.warnings);

        let services = fetch_services(&conn).unwrap();
        assert_eq!(services[0].quantity, Some(3));
        assert_eq!(services[1].quantity, None);
        assert_eq!(services[1].service_date, None);

        let view = build_inventory(&fetch_records(&conn).unwrap(), MonthOrder::Calendar);
        assert_eq!(view.totals.services, 15000.0);
        assert_eq!(view.monthly.len(), 1);
    }

    #[test]
    fn test_import_unlinks_unknown_enrollment() {
        let (dir, conn) = test_db();
        let path = write_csv(
            dir.path(),
            "paiements.csv",
            "inscription_id,montant_total,montant_paye,est_solde,date_creation\n7,100,50,non,2024-01-01\n",
        );
        let result = import_file(&conn, &path, RecordKind::Payment).unwrap();
        assert_eq!(result.imported, 1);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(fetch_payments(&conn).unwrap()[0].enrollment_id, None);
    }

    #[test]
    fn test_import_decimal_comma_values() {
        let (dir, conn) = test_db();
        let path = write_csv(
            dir.path(),
            "prestations.csv",
            "nom_prestation;nom_client;prix;quantite;date_prestation\n\
             Saisie;Cabinet Bangoura;1 234,50;2,5;2024-05-10\n\
             Impression;BTP Conakry;12,5;4;2024-05-11\n",
        );
        let result = import_file(&conn, &path, RecordKind::Service).unwrap();
        assert_eq!(result.imported, 2);
        assert_eq!(result.warnings.len(), 1, "{:?}", result.warnings);
        assert!(result.warnings[0].starts_with("line 2:"));

        let services = fetch_services(&conn).unwrap();
        assert_eq!(services[0].unit_price, 1234.5);
        assert_eq!(services[0].quantity, None);
        assert_eq!(services[1].unit_price, 12.5);
        assert_eq!(services[1].quantity, Some(4));
    }

    #[test]
    fn test_sniff_delimiter() {
        let dir = tempfile::tempdir().unwrap();
        let semi = write_csv(dir.path(), "a.csv", "nom;somme\nLoyer;1 200,00\n");
        let comma = write_csv(dir.path(), "b.csv", "name,sum\nLoyer,\"1,200\"\n");
        assert_eq!(sniff_delimiter(&semi).unwrap(), b';');
        assert_eq!(sniff_delimiter(&comma).unwrap(), b',');
    }

    #[test]
    fn test_amount_value_keeps_unparsable_text() {
        assert_eq!(amount_value(Some("1 000")), Value::Real(1000.0));
        assert_eq!(amount_value(Some("gratuit")), Value::Text("gratuit".into()));
        assert_eq!(amount_value(None), Value::Null);
    }
}
