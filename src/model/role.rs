#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Role {
    Admin = 1,
    Hr = 2,
    Director = 3,
    Manager = 4,
    Employee = 5,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Hr),
            3 => Some(Role::Director),
            4 => Some(Role::Manager),
            5 => Some(Role::Employee),
            _ => None,
        }
    }

    /// HR staff and administrators run the approval desks.
    pub fn is_hr_desk(self) -> bool {
        matches!(self, Role::Admin | Role::Hr)
    }
}
