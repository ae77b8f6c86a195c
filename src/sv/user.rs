use crate::{entity::user, prelude::*};

pub struct User<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> User<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn get_or_create(
    &self,
    user_id: &str,
    email: &str,
  ) -> Result<user::Model> {
    if let Some(user) = user::Entity::find_by_id(user_id).one(self.db).await? {
      return Ok(user);
    }

    let now = Utc::now().naive_utc();
    let user = user::ActiveModel {
      id: Set(user_id.to_string()),
      email: Set(email.to_string()),
      created_at: Set(now),
    };

    Ok(user.insert(self.db).await?)
  }

  pub async fn by_id(&self, user_id: &str) -> Result<Option<user::Model>> {
    let user = user::Entity::find_by_id(user_id).one(self.db).await?;
    Ok(user)
  }

  pub async fn require(&self, user_id: &str) -> Result<user::Model> {
    self.by_id(user_id).await?.ok_or(Error::UserNotFound)
  }

  #[allow(dead_code)]
  pub async fn count(&self) -> Result<u64> {
    Ok(user::Entity::find().count(self.db).await?)
  }
}
