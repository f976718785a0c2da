//! Parsers for the Horizons plain-text response.
//!
//! A `format=text` response is a free-form header followed by the CSV
//! ephemeris block between `$$SOE` and `$$EOE`. Requests outside the span a
//! body has data for come back without that block and carry a
//! "No ephemeris for target ..." diagnostic instead.

use chrono::{DateTime, NaiveDateTime, Utc};
use ephem_core::{BodyId, Center, EphemError, OrbitalElements, Position, Result};
use regex::Regex;
use std::sync::LazyLock;

const START_OF_EPHEMERIS: &str = "$$SOE";
const END_OF_EPHEMERIS: &str = "$$EOE";
const TARGET_NAME_PREFIX: &str = "Target body name: ";

// ELEMENTS table columns with CSV_FORMAT=YES.
const COL_CALENDAR_DATE: usize = 1;
const COL_EC: usize = 2;
const COL_IN: usize = 4;
const COL_OM: usize = 5;
const COL_W: usize = 6;
const COL_MA: usize = 9;
const COL_A: usize = 11;

static BOUND_DIAGNOSTIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)No ephemeris for target .*?\b(prior to|after)\s+A\.D\.\s+(\d{4}-[a-z]{3}-\d{2}\s+\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?)",
    )
    .unwrap()
});

/// Which end of a body's ephemeris span a diagnostic describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundEdge {
    /// "No ephemeris ... prior to": the first instant with data.
    Prior,
    /// "No ephemeris ... after": the last instant with data.
    After,
}

impl BoundEdge {
    const fn keyword(self) -> &'static str {
        match self {
            Self::Prior => "prior to",
            Self::After => "after",
        }
    }
}

/// Parses the rows of the `$$SOE`/`$$EOE` block into positions.
///
/// Returns an empty vector when the block is absent, which is how Horizons
/// answers a window with no data. Mean longitude and longitude of periapsis
/// are derived from the node, argument of periapsis and mean anomaly.
///
/// # Errors
/// Returns [`EphemError::RemoteFormat`] if a row is short or a field does not parse.
pub fn parse_elements(text: &str, body: BodyId, center: &Center) -> Result<Vec<Position>> {
    let mut positions = Vec::new();
    let mut in_block = false;

    for line in text.lines() {
        if line.contains(END_OF_EPHEMERIS) {
            break;
        }
        if !in_block {
            in_block = line.contains(START_OF_EPHEMERIS);
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        positions.push(parse_row(line, body, center)?);
    }

    Ok(positions)
}

fn parse_row(line: &str, body: BodyId, center: &Center) -> Result<Position> {
    let columns: Vec<&str> = line.split(',').map(str::trim).collect();
    if columns.len() <= COL_A {
        return Err(EphemError::RemoteFormat(format!(
            "expected at least {} columns, got {}: {line}",
            COL_A + 1,
            columns.len()
        )));
    }

    let time = parse_calendar_date(columns[COL_CALENDAR_DATE])?;
    let float = |index: usize| -> Result<f64> {
        columns[index].parse::<f64>().map_err(|e| {
            EphemError::RemoteFormat(format!("column {index} `{}`: {e}", columns[index]))
        })
    };

    let ascending_node = float(COL_OM)?;
    let argument_of_periapsis = float(COL_W)?;
    let mean_anomaly = float(COL_MA)?;

    let elements = OrbitalElements {
        semimajor_axis: float(COL_A)?,
        eccentricity: float(COL_EC)?,
        inclination: float(COL_IN)?,
        mean_longitude: ascending_node + argument_of_periapsis + mean_anomaly,
        longitude_of_periapsis: ascending_node + argument_of_periapsis,
        longitude_of_ascending_node: ascending_node,
    };

    Ok(Position::new(body, center.clone(), time, elements))
}

/// Parses a calendar date such as `A.D. 2020-Jan-01 00:00:00.0000`.
fn parse_calendar_date(field: &str) -> Result<DateTime<Utc>> {
    let date = field.strip_prefix("A.D.").map_or(field, str::trim);
    parse_month_name_date(date)
        .ok_or_else(|| EphemError::RemoteFormat(format!("unrecognised calendar date `{field}`")))
}

fn parse_month_name_date(date: &str) -> Option<DateTime<Utc>> {
    let normalized = normalize_month(date.trim());
    ["%Y-%b-%d %H:%M:%S%.f", "%Y-%b-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&normalized, format).ok())
        .map(|naive| naive.and_utc())
}

/// Rewrites `2020-JAN-01 ...` as `2020-Jan-01 ...`.
fn normalize_month(date: &str) -> String {
    let mut out = String::with_capacity(date.len());
    let mut dashes = 0;
    let mut month_pos = 0;
    for c in date.chars() {
        if c == '-' {
            dashes += 1;
            out.push(c);
            continue;
        }
        if dashes == 1 {
            if month_pos == 0 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c.to_ascii_lowercase());
            }
            month_pos += 1;
        } else {
            out.push(c);
        }
    }
    out
}

/// Extracts the display name from the `Target body name:` header line.
///
/// The line looks like `Target body name: Mars (499)  {source: mar097}`.
/// Anything from the parenthesised identifier on is dropped, and so is a
/// trailing parenthesised qualifier such as `(spacecraft)`.
#[must_use]
pub fn parse_target_name(text: &str, body: BodyId) -> Option<String> {
    let line = text.lines().find(|line| line.contains(TARGET_NAME_PREFIX))?;
    let (_, info) = line.split_once(TARGET_NAME_PREFIX)?;
    let info = info.trim();

    let separator = format!(" ({body}) ");
    let mut name = info.split(separator.as_str()).next().unwrap_or(info).trim();
    if name.ends_with(')') {
        if let Some((head, _)) = name.rsplit_once('(') {
            name = head.trim();
        }
    }

    (!name.is_empty()).then(|| name.to_string())
}

/// Finds the bound reported by a "No ephemeris for target" diagnostic.
///
/// Returns `Ok(None)` if the text carries no diagnostic for `edge`.
///
/// # Errors
/// Returns [`EphemError::RemoteFormat`] if the diagnostic date does not parse.
pub fn parse_bound(text: &str, edge: BoundEdge) -> Result<Option<DateTime<Utc>>> {
    for captures in BOUND_DIAGNOSTIC.captures_iter(text) {
        if !captures[1].eq_ignore_ascii_case(edge.keyword()) {
            continue;
        }
        let raw = &captures[2];
        let bound = parse_month_name_date(raw).ok_or_else(|| {
            EphemError::RemoteFormat(format!("unrecognised ephemeris bound `{raw}`"))
        })?;
        return Ok(Some(bound));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const EARTH_RESPONSE: &str = r"*******************************************************************************
 Revised: April 12, 2021                 Earth                              399
*******************************************************************************
Ephemeris / API_USER Mon Jan  6 12:00:00 2025 Pasadena, USA      / Horizons
*******************************************************************************
Target body name: Earth (399)                     {source: DE441}
Center body name: Sun (10)                        {source: DE441}
Center-site name: BODY CENTER
*******************************************************************************
            JDTDB,            Calendar Date (TDB),                     EC,                     QR,                     IN,                     OM,                      W,                     Tp,                      N,                     MA,                     TA,                      A,                     AD,                     PR,
**************************************************************************************************************************************************************************************************************************************************************************************************************************************************************************
$$SOE
2458849.500000000, A.D. 2020-Jan-01 00:00:00.0000,  1.703987571552689E-02,  9.832857542240111E-01,  3.213553396851093E-03,  1.742933611993689E+02,  2.889461098048498E+02,  2.458853633026106E+06,  9.856474983937062E-01,  3.559276034046549E+02,  3.557890106036051E+02,  1.000331985290318E+00,  1.017378216356625E+00,  3.652423290093713E+02,
2458850.500000000, A.D. 2020-Jan-02 00:00:00.0000,  1.704086117929016E-02,  9.832848453432547E-01,  3.212478519478224E-03,  1.741961396394591E+02,  2.890497085813022E+02,  2.458853638412876E+06,  9.856478226916093E-01,  3.569079454803212E+02,  3.568948035697127E+02,  1.000331765881669E+00,  1.017378686420083E+00,  3.652422088367879E+02,
$$EOE
**************************************************************************************************************************************************************************************************************************************************************************************************************************************************************************
";

    fn center() -> Center {
        Center::new("500@10").unwrap()
    }

    #[test]
    fn test_parse_elements_block() {
        let positions = parse_elements(EARTH_RESPONSE, BodyId::new(399), &center()).unwrap();
        assert_eq!(positions.len(), 2);

        let first = &positions[0];
        assert_eq!(first.body, BodyId::new(399));
        assert_eq!(first.center, center());
        assert_eq!(first.time, Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(positions[1].time, Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap());

        let e = first.elements;
        assert!((e.semimajor_axis - 1.000_331_985_290_318).abs() < 1e-12);
        assert!((e.eccentricity - 0.017_039_875_715_526_89).abs() < 1e-12);
        assert!((e.inclination - 0.003_213_553_396_851_093).abs() < 1e-12);
        assert!((e.longitude_of_ascending_node - 174.293_361_199_368_9).abs() < 1e-9);
        let om = 174.293_361_199_368_9;
        let w = 288.946_109_804_849_8;
        let ma = 355.927_603_404_654_9;
        assert!((e.longitude_of_periapsis - (om + w)).abs() < 1e-9);
        assert!((e.mean_longitude - (om + w + ma)).abs() < 1e-9);
    }

    #[test]
    fn test_missing_block_is_empty() {
        let text = "Target body name: Earth (399)\nNo ephemeris for target \"Earth\" prior to A.D. 1599-DEC-10 23:59:00.0000 TDB\n";
        assert!(
            parse_elements(text, BodyId::new(399), &center())
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_short_row_is_a_format_error() {
        let text = "$$SOE\n2458849.5, A.D. 2020-Jan-01 00:00:00.0000, 0.1,\n$$EOE\n";
        let err = parse_elements(text, BodyId::new(399), &center()).unwrap_err();
        assert!(matches!(err, EphemError::RemoteFormat(_)));
    }

    #[test]
    fn test_bad_number_is_a_format_error() {
        let row = "2458849.5, A.D. 2020-Jan-01 00:00:00.0000, n/a, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0,";
        let text = format!("$$SOE\n{row}\n$$EOE\n");
        let err = parse_elements(&text, BodyId::new(399), &center()).unwrap_err();
        assert!(matches!(err, EphemError::RemoteFormat(_)));
    }

    #[test]
    fn test_target_name() {
        assert_eq!(
            parse_target_name(EARTH_RESPONSE, BodyId::new(399)).as_deref(),
            Some("Earth")
        );

        let spacecraft = "Target body name: Mars Reconnaissance Orbiter (spacecraft) (-74) {source: mro_merged}";
        assert_eq!(
            parse_target_name(spacecraft, BodyId::new(-74)).as_deref(),
            Some("Mars Reconnaissance Orbiter")
        );

        let bare = "Target body name: Mars (499)";
        assert_eq!(
            parse_target_name(bare, BodyId::new(499)).as_deref(),
            Some("Mars")
        );

        assert_eq!(parse_target_name("no header here", BodyId::new(1)), None);
    }

    #[test]
    fn test_bound_diagnostics() {
        let prior = "No ephemeris for target \"Earth\" prior to A.D. 1599-DEC-10 23:59:00.0000 TDB";
        assert_eq!(
            parse_bound(prior, BoundEdge::Prior).unwrap(),
            Some(Utc.with_ymd_and_hms(1599, 12, 10, 23, 59, 0).unwrap())
        );
        assert_eq!(parse_bound(prior, BoundEdge::After).unwrap(), None);

        let after = "No ephemeris for target \"Earth\" after A.D. 2500-JAN-04 00:00 TDB";
        assert_eq!(
            parse_bound(after, BoundEdge::After).unwrap(),
            Some(Utc.with_ymd_and_hms(2500, 1, 4, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_bound(EARTH_RESPONSE, BoundEdge::Prior).unwrap(), None);
    }

    #[test]
    fn test_unparseable_bound_is_a_format_error() {
        let text = "No ephemeris for target \"Earth\" after A.D. 2500-XYZ-04 00:00 TDB";
        let err = parse_bound(text, BoundEdge::After).unwrap_err();
        assert!(matches!(err, EphemError::RemoteFormat(_)));
    }
}
