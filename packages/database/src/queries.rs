//! Aggregation queries behind the dashboard views.
//!
//! Each function runs one statement against an open connection and maps
//! the rows into the view's result type. Filters are rendered as SQL
//! fragments with `?` placeholders and a parallel parameter list.

use crime_dash_analytics_models::{
    ArrestStatistic, DetailedStatistic, HourlyCount, LocationCount, Summary, TimeFilter,
    TimeTrendPoint, TypeArrestCount, YearFilter,
};
use duckdb::Connection;

use crate::DbError;
use crate::store::TABLE_NAME;

/// Excludes rows without a primary type.
const HAS_PRIMARY_TYPE: &str = "\"PrimaryType\" IS NOT NULL";

/// Excludes rows without a location description.
const HAS_LOCATION: &str = "\"LocationDescription\" IS NOT NULL";

/// Renders `filter` as WHERE fragments plus their bound parameters.
fn build_filters(filter: &TimeFilter) -> (Vec<&'static str>, Vec<i64>) {
    let mut frags = Vec::new();
    let mut params = Vec::new();

    match filter.years {
        YearFilter::All => {}
        YearFilter::Single(year) => {
            frags.push("\"Year\" = ?");
            params.push(i64::from(year));
        }
        YearFilter::Range { from, to } => {
            frags.push("\"Year\" BETWEEN ? AND ?");
            params.push(i64::from(from));
            params.push(i64::from(to));
        }
    }

    if let Some(month) = filter.month {
        frags.push("\"Month\" = ?");
        params.push(i64::from(month));
    }

    (frags, params)
}

fn where_clause(frags: &[&str]) -> String {
    if frags.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", frags.join(" AND "))
    }
}

/// Filter fragments for `filter` plus any fixed `extra` conditions.
fn filtered(filter: &TimeFilter, extra: &[&'static str]) -> (String, Vec<i64>) {
    let (mut frags, params) = build_filters(filter);
    frags.extend_from_slice(extra);
    (where_clause(&frags), params)
}

/// Prepares `sql`, binds `params` in order, and maps every result row.
fn query_rows<T>(
    conn: &Connection,
    sql: &str,
    params: &[i64],
    mut map: impl FnMut(&duckdb::Row<'_>) -> duckdb::Result<T>,
) -> Result<Vec<T>, DbError> {
    log::debug!("{sql} -- params {params:?}");

    let mut stmt = conn.prepare(sql)?;
    for (i, value) in params.iter().enumerate() {
        stmt.raw_bind_parameter(i + 1, value)?;
    }
    stmt.raw_execute()?;

    let mut out = Vec::new();
    let mut rows = stmt.raw_query();
    while let Some(row) = rows.next()? {
        out.push(map(row)?);
    }
    Ok(out)
}

/// Crimes per (year, month), chronological.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn time_trend(conn: &Connection, filter: &TimeFilter) -> Result<Vec<TimeTrendPoint>, DbError> {
    let (where_sql, params) = filtered(filter, &[]);
    let sql = format!(
        "SELECT \"Year\", \"Month\"::UTINYINT, COUNT(*)
         FROM \"{TABLE_NAME}\"{where_sql}
         GROUP BY \"Year\", \"Month\"
         ORDER BY \"Year\", \"Month\""
    );

    query_rows(conn, &sql, &params, |row| {
        Ok(TimeTrendPoint {
            year: row.get(0)?,
            month: row.get(1)?,
            count: row.get(2)?,
        })
    })
}

/// Crimes per hour of day.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn hourly_distribution(
    conn: &Connection,
    filter: &TimeFilter,
) -> Result<Vec<HourlyCount>, DbError> {
    let (where_sql, params) = filtered(filter, &[]);
    let sql = format!(
        "SELECT \"Hour\"::UTINYINT, COUNT(*)
         FROM \"{TABLE_NAME}\"{where_sql}
         GROUP BY \"Hour\"
         ORDER BY \"Hour\""
    );

    query_rows(conn, &sql, &params, |row| {
        Ok(HourlyCount {
            hour: row.get(0)?,
            count: row.get(1)?,
        })
    })
}

/// Crimes per location description, most frequent first.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn location_distribution(
    conn: &Connection,
    filter: &TimeFilter,
) -> Result<Vec<LocationCount>, DbError> {
    let (where_sql, params) = filtered(filter, &[HAS_LOCATION]);
    let sql = format!(
        "SELECT \"LocationDescription\", COUNT(*) AS n
         FROM \"{TABLE_NAME}\"{where_sql}
         GROUP BY \"LocationDescription\"
         ORDER BY n DESC, \"LocationDescription\""
    );

    query_rows(conn, &sql, &params, |row| {
        Ok(LocationCount {
            location_description: row.get(0)?,
            count: row.get(1)?,
        })
    })
}

/// The `limit` most frequent primary types with their arrest counts.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn type_vs_arrest(
    conn: &Connection,
    filter: &TimeFilter,
    limit: usize,
) -> Result<Vec<TypeArrestCount>, DbError> {
    let (where_sql, mut params) = filtered(filter, &[HAS_PRIMARY_TYPE]);
    params.push(i64::try_from(limit).unwrap_or(i64::MAX));
    let sql = format!(
        "SELECT \"PrimaryType\", COUNT(*) AS n, SUM(\"Arrest\")::BIGINT
         FROM \"{TABLE_NAME}\"{where_sql}
         GROUP BY \"PrimaryType\"
         ORDER BY n DESC, \"PrimaryType\"
         LIMIT ?"
    );

    query_rows(conn, &sql, &params, |row| {
        Ok(TypeArrestCount {
            primary_type: row.get(0)?,
            count: row.get(1)?,
            arrests: row.get(2)?,
        })
    })
}

/// Arrest rate for every primary type, most frequent first.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn arrest_statistics(
    conn: &Connection,
    filter: &TimeFilter,
) -> Result<Vec<ArrestStatistic>, DbError> {
    let (where_sql, params) = filtered(filter, &[HAS_PRIMARY_TYPE]);
    let sql = format!(
        "SELECT \"PrimaryType\", COUNT(*) AS n, SUM(\"Arrest\")::BIGINT, AVG(\"Arrest\")::DOUBLE
         FROM \"{TABLE_NAME}\"{where_sql}
         GROUP BY \"PrimaryType\"
         ORDER BY n DESC, \"PrimaryType\""
    );

    query_rows(conn, &sql, &params, |row| {
        Ok(ArrestStatistic {
            primary_type: row.get(0)?,
            count: row.get(1)?,
            arrests: row.get(2)?,
            arrest_rate: row.get(3)?,
        })
    })
}

/// Per-type share of all crimes and statistics over the type's monthly
/// counts.
///
/// The filter is applied once in a CTE. Shares are taken over every
/// filtered crime, typed or not; months in which a type did not occur do
/// not contribute to its monthly statistics.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn detailed_statistics(
    conn: &Connection,
    filter: &TimeFilter,
) -> Result<Vec<DetailedStatistic>, DbError> {
    let (where_sql, params) = filtered(filter, &[]);
    let sql = format!(
        "WITH filtered AS (
             SELECT \"PrimaryType\" AS primary_type, \"Year\" AS y, \"Month\" AS m
             FROM \"{TABLE_NAME}\"{where_sql}
         ),
         monthly AS (
             SELECT primary_type, y, m, COUNT(*) AS n
             FROM filtered
             WHERE primary_type IS NOT NULL
             GROUP BY primary_type, y, m
         ),
         totals AS (
             SELECT COUNT(*)::DOUBLE AS total FROM filtered
         )
         SELECT
             primary_type,
             SUM(n)::BIGINT AS cnt,
             SUM(n)::DOUBLE * 100 / (SELECT total FROM totals),
             AVG(n)::DOUBLE,
             MIN(n)::BIGINT,
             MAX(n)::BIGINT,
             STDDEV_SAMP(n)::DOUBLE,
             MEDIAN(n)::DOUBLE
         FROM monthly
         GROUP BY primary_type
         ORDER BY cnt DESC, primary_type"
    );

    query_rows(conn, &sql, &params, |row| {
        Ok(DetailedStatistic {
            primary_type: row.get(0)?,
            count: row.get(1)?,
            share_percent: row.get(2)?,
            monthly_mean: row.get(3)?,
            monthly_min: row.get(4)?,
            monthly_max: row.get(5)?,
            monthly_std_dev: row.get(6)?,
            monthly_median: row.get(7)?,
        })
    })
}

/// Totals over the filtered incidents.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn summary(conn: &Connection, filter: &TimeFilter) -> Result<Summary, DbError> {
    let (where_sql, params) = filtered(filter, &[]);
    let sql = format!(
        "SELECT COUNT(*), COALESCE(SUM(\"Arrest\"), 0)::BIGINT, COUNT(DISTINCT \"PrimaryType\")
         FROM \"{TABLE_NAME}\"{where_sql}"
    );

    let rows = query_rows(conn, &sql, &params, |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, i64>(2)?,
        ))
    })?;
    let (total_crimes, total_arrests, distinct_types) =
        rows.into_iter().next().unwrap_or((0, 0, 0));

    #[allow(clippy::cast_precision_loss)]
    let ratio = |num: i64, den: i64| {
        if den == 0 { 0.0 } else { num as f64 / den as f64 }
    };

    Ok(Summary {
        total_crimes,
        total_arrests,
        arrest_rate: ratio(total_arrests, total_crimes),
        distinct_types,
        mean_crimes_per_type: ratio(total_crimes, distinct_types),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::incident;
    use crate::store;

    fn memory_store(rows: &[crime_dash_incident_models::StoredIncident]) -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        store::create_table(&conn, false).unwrap();
        store::insert_incidents(&mut conn, rows, |_| {}).unwrap();
        conn
    }

    fn spread_over_years() -> Vec<crime_dash_incident_models::StoredIncident> {
        let mut rows = Vec::new();
        let mut n = 0;
        for (year, count) in [(2007, 1), (2008, 2), (2009, 3), (2010, 4), (2011, 5)] {
            for i in 0..count {
                n += 1;
                rows.push(incident(
                    &format!("Y{n:04}"),
                    (year, 1 + i % 12, i % 24),
                    "THEFT",
                    Some("STREET"),
                    i % 2 == 0,
                ));
            }
        }
        rows
    }

    #[test]
    fn build_filters_binds_every_value() {
        let (frags, params) = build_filters(&TimeFilter::range(2008, 2010).with_month(6));
        assert_eq!(frags, vec!["\"Year\" BETWEEN ? AND ?", "\"Month\" = ?"]);
        assert_eq!(params, vec![2008, 2010, 6]);

        let (frags, params) = build_filters(&TimeFilter::all());
        assert!(frags.is_empty());
        assert!(params.is_empty());
    }

    #[test]
    fn where_clause_joins_with_and() {
        assert_eq!(where_clause(&[]), "");
        assert_eq!(where_clause(&["a", "b"]), " WHERE a AND b");
    }

    #[test]
    fn single_year_filter_restricts_exactly() {
        let conn = memory_store(&spread_over_years());

        let trend = time_trend(&conn, &TimeFilter::year(2008)).unwrap();

        assert!(trend.iter().all(|p| p.year == 2008));
        assert_eq!(trend.iter().map(|p| p.count).sum::<i64>(), 2);
        assert_eq!(summary(&conn, &TimeFilter::year(2008)).unwrap().total_crimes, 2);
    }

    #[test]
    fn year_range_filter_is_inclusive() {
        let conn = memory_store(&spread_over_years());

        let trend = time_trend(&conn, &TimeFilter::range(2008, 2010)).unwrap();

        assert!(trend.iter().all(|p| (2008..=2010).contains(&p.year)));
        assert_eq!(trend.iter().map(|p| p.count).sum::<i64>(), 2 + 3 + 4);
        let hourly: i64 = hourly_distribution(&conn, &TimeFilter::range(2008, 2010))
            .unwrap()
            .iter()
            .map(|h| h.count)
            .sum();
        assert_eq!(hourly, 9);
    }

    #[test]
    fn month_filter_combines_with_years() {
        let conn = memory_store(&spread_over_years());
        let trend = time_trend(&conn, &TimeFilter::range(2008, 2011).with_month(2)).unwrap();
        assert_eq!(
            trend,
            vec![
                TimeTrendPoint { year: 2008, month: 2, count: 1 },
                TimeTrendPoint { year: 2009, month: 2, count: 1 },
                TimeTrendPoint { year: 2010, month: 2, count: 1 },
                TimeTrendPoint { year: 2011, month: 2, count: 1 },
            ]
        );
    }

    #[test]
    fn time_trend_is_chronological() {
        let conn = memory_store(&spread_over_years());
        let trend = time_trend(&conn, &TimeFilter::all()).unwrap();
        let keys: Vec<_> = trend.iter().map(|p| (p.year, p.month)).collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn type_vs_arrest_returns_top_ten_descending() {
        let mut rows = Vec::new();
        for t in 0..15 {
            for i in 0..=t {
                rows.push(incident(
                    &format!("T{t:02}-{i:02}"),
                    (2012, 1, 0),
                    &format!("TYPE{t:02}"),
                    None,
                    i == 0,
                ));
            }
        }
        let conn = memory_store(&rows);

        let top = type_vs_arrest(&conn, &TimeFilter::all(), 10).unwrap();

        assert_eq!(top.len(), 10);
        assert_eq!(top[0].primary_type, "TYPE14");
        assert_eq!(top[0].count, 15);
        assert_eq!(top[0].arrests, 1);
        assert!(top.windows(2).all(|w| w[0].count >= w[1].count));
    }

    #[test]
    fn locations_exclude_missing_and_sort_by_count() {
        let conn = memory_store(&[
            incident("L1", (2012, 1, 0), "THEFT", Some("STREET"), false),
            incident("L2", (2012, 1, 0), "THEFT", Some("STREET"), false),
            incident("L3", (2012, 1, 0), "THEFT", Some("ALLEY"), false),
            incident("L4", (2012, 1, 0), "THEFT", None, false),
        ]);

        let locations = location_distribution(&conn, &TimeFilter::all()).unwrap();

        assert_eq!(
            locations,
            vec![
                LocationCount { location_description: "STREET".into(), count: 2 },
                LocationCount { location_description: "ALLEY".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn arrest_statistics_compute_rates() {
        let conn = memory_store(&[
            incident("A1", (2012, 1, 0), "THEFT", None, true),
            incident("A2", (2012, 1, 0), "THEFT", None, false),
            incident("A3", (2012, 1, 0), "THEFT", None, false),
            incident("A4", (2012, 1, 0), "THEFT", None, false),
            incident("A5", (2012, 1, 0), "NARCOTICS", None, true),
        ]);

        let stats = arrest_statistics(&conn, &TimeFilter::all()).unwrap();

        assert_eq!(stats[0].primary_type, "THEFT");
        assert!((stats[0].arrest_rate - 0.25).abs() < 1e-12);
        assert_eq!(stats[1].arrests, 1);
        assert!((stats[1].arrest_rate - 1.0).abs() < 1e-12);
    }

    #[test]
    fn detailed_statistics_over_monthly_counts() {
        // THEFT: 1 in Jan, 2 in Feb, 6 in Mar; BATTERY: 1 in Jan.
        let mut rows = Vec::new();
        for (month, count) in [(1, 1), (2, 2), (3, 6)] {
            for i in 0..count {
                rows.push(incident(&format!("D{month}-{i}"), (2014, month, 0), "THEFT", None, false));
            }
        }
        rows.push(incident("B1", (2014, 1, 0), "BATTERY", None, false));
        let conn = memory_store(&rows);

        let stats = detailed_statistics(&conn, &TimeFilter::all()).unwrap();

        assert_eq!(stats.len(), 2);
        let theft = &stats[0];
        assert_eq!(theft.primary_type, "THEFT");
        assert_eq!(theft.count, 9);
        assert!((theft.share_percent - 90.0).abs() < 1e-9);
        assert!((theft.monthly_mean - 3.0).abs() < 1e-9);
        assert_eq!(theft.monthly_min, 1);
        assert_eq!(theft.monthly_max, 6);
        assert!((theft.monthly_median - 2.0).abs() < 1e-9);
        assert!((theft.monthly_std_dev.unwrap() - 7.0f64.sqrt()).abs() < 1e-9);

        let battery = &stats[1];
        assert!((battery.share_percent - 10.0).abs() < 1e-9);
        assert_eq!(battery.monthly_std_dev, None);
    }

    #[test]
    fn detailed_share_counts_untyped_crimes() {
        let mut untyped = incident("N1", (2014, 1, 0), "THEFT", None, false);
        untyped.primary_type = None;
        let conn = memory_store(&[
            incident("N0", (2014, 1, 0), "THEFT", None, false),
            untyped,
        ]);

        let stats = detailed_statistics(&conn, &TimeFilter::all()).unwrap();

        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].count, 1);
        assert!((stats[0].share_percent - 50.0).abs() < 1e-9);
        assert_eq!(summary(&conn, &TimeFilter::all()).unwrap().total_crimes, 2);
    }

    #[test]
    fn summary_totals() {
        let conn = memory_store(&[
            incident("S1", (2012, 1, 0), "THEFT", None, true),
            incident("S2", (2012, 1, 0), "THEFT", None, false),
            incident("S3", (2012, 1, 0), "BATTERY", None, true),
            incident("S4", (2012, 1, 0), "ASSAULT", None, false),
        ]);

        let s = summary(&conn, &TimeFilter::all()).unwrap();

        assert_eq!(s.total_crimes, 4);
        assert_eq!(s.total_arrests, 2);
        assert!((s.arrest_rate - 0.5).abs() < 1e-12);
        assert_eq!(s.distinct_types, 3);
        assert!((s.mean_crimes_per_type - 4.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn summary_of_empty_store_is_zero() {
        let conn = memory_store(&[]);
        let s = summary(&conn, &TimeFilter::all()).unwrap();
        assert_eq!(s.total_crimes, 0);
        assert!(s.arrest_rate.abs() < f64::EPSILON);
    }
}
