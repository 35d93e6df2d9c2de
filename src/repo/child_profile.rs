use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use sqlx::MySqlPool;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ChildProfileRow {
  pub id: i64,
  pub parent_id: i64,
  pub display_name: String,
  pub birth_date: Option<NaiveDate>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl ChildProfileRow {
  /// Age in whole years as of `today`, or `None` if no birth date is on file.
  pub fn age_years(&self, today: NaiveDate) -> Option<i32> {
    let birth_date = self.birth_date?;
    let mut age = today.year() - birth_date.year();
    let had_birthday_this_year =
      (today.month(), today.day()) >= (birth_date.month(), birth_date.day());
    if !had_birthday_this_year {
      age -= 1;
    }
    Some(age)
  }
}

pub async fn create(
  pool: &MySqlPool,
  parent_id: i64,
  display_name: &str,
  birth_date: Option<NaiveDate>,
) -> Result<ChildProfileRow, sqlx::Error> {
  let result = sqlx::query("INSERT INTO child_profiles (parent_id, display_name, birth_date) VALUES (?, ?, ?);")
    .bind(parent_id)
    .bind(display_name)
    .bind(birth_date)
    .execute(pool)
    .await?;
  find_by_id(pool, result.last_insert_id() as i64).await?.ok_or(sqlx::Error::RowNotFound)
}

pub async fn find_by_id(pool: &MySqlPool, id: i64) -> Result<Option<ChildProfileRow>, sqlx::Error> {
  sqlx::query_as::<_, ChildProfileRow>("SELECT * FROM child_profiles WHERE id = ?;")
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn list_for_parent(pool: &MySqlPool, parent_id: i64) -> Result<Vec<ChildProfileRow>, sqlx::Error> {
  sqlx::query_as::<_, ChildProfileRow>("SELECT * FROM child_profiles WHERE parent_id = ? ORDER BY id ASC;")
    .bind(parent_id)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
  use super::*;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  fn row_with_birth_date(birth_date: Option<NaiveDate>) -> ChildProfileRow {
    ChildProfileRow {
      id: 1,
      parent_id: 1,
      display_name: "Test".into(),
      birth_date,
      created_at: Utc::now(),
      updated_at: Utc::now(),
    }
  }

  #[test]
  fn age_is_none_without_birth_date() {
    assert_eq!(row_with_birth_date(None).age_years(date(2026, 7, 28)), None);
  }

  #[test]
  fn age_counts_birthday_already_passed_this_year() {
    let row = row_with_birth_date(Some(date(2015, 1, 1)));
    assert_eq!(row.age_years(date(2026, 7, 28)), Some(11));
  }

  #[test]
  fn age_does_not_count_birthday_not_yet_reached_this_year() {
    let row = row_with_birth_date(Some(date(2013, 12, 31)));
    assert_eq!(row.age_years(date(2026, 7, 28)), Some(12));
  }

  #[test]
  fn age_on_exact_birthday_counts_as_turning() {
    let row = row_with_birth_date(Some(date(2013, 7, 28)));
    assert_eq!(row.age_years(date(2026, 7, 28)), Some(13));
  }
}
