//! Context prompts that instruct the model to answer with SQL text only.

/// Tables of the SQL Server `Pubs` sample database.
pub const PUBS_SCHEMA: &[(&str, &[&str])] = &[
    ("publishers", &["pub_id", "pub_name", "city", "state", "country"]),
    (
        "authors",
        &[
            "au_id", "au_lname", "au_fname", "phone", "address", "city", "state", "zip",
            "contract",
        ],
    ),
    (
        "titles",
        &[
            "title_id", "title", "type", "pub_id", "price", "advance", "royalty", "ytd_sales",
            "notes", "pubdate",
        ],
    ),
    ("titleauthor", &["au_id", "title_id", "au_ord", "royaltyper"]),
    (
        "stores",
        &["stor_id", "stor_name", "stor_address", "city", "state", "zip"],
    ),
    (
        "sales",
        &["stor_id", "ord_num", "ord_date", "qty", "payterms", "title_id"],
    ),
];

/// Statements the model is told never to emit.
pub const FORBIDDEN_STATEMENTS: &[&str] = &["DROP", "DELETE", "UPDATE", "INSERT", "ALTER", "EXEC"];

/// Builder for the SQL-generation directive sent as the context prompt.
#[derive(Debug, Clone)]
pub struct SqlContext {
    assistant_name: String,
    database: String,
    tables: Vec<(String, Vec<String>)>,
    default_limit: u32,
}

impl Default for SqlContext {
    fn default() -> Self {
        Self {
            assistant_name: "MartAI".to_string(),
            database: "Pubs".to_string(),
            tables: PUBS_SCHEMA
                .iter()
                .map(|(table, columns)| {
                    (
                        table.to_string(),
                        columns.iter().map(|c| c.to_string()).collect(),
                    )
                })
                .collect(),
            default_limit: 100,
        }
    }
}

impl SqlContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the schema with another database's tables.
    pub fn with_schema<I, T, C>(mut self, database: impl Into<String>, tables: I) -> Self
    where
        I: IntoIterator<Item = (T, Vec<C>)>,
        T: Into<String>,
        C: Into<String>,
    {
        self.database = database.into();
        self.tables = tables
            .into_iter()
            .map(|(table, columns)| (table.into(), columns.into_iter().map(Into::into).collect()))
            .collect();
        self
    }

    pub fn with_default_limit(mut self, limit: u32) -> Self {
        self.default_limit = limit;
        self
    }

    /// Render the full directive around `question`.
    pub fn render(&self, question: &str) -> String {
        let mut prompt = format!(
            "Eres {name}, un asistente experto en bases de datos SQL Server.\n\
             Tu tarea es traducir preguntas en lenguaje natural a consultas SQL válidas y precisas\n\
             sobre la base de datos \"{db}\", sin ejecutar el código.\n\n\
             Esquema de la base de datos {db}:\n",
            name = self.assistant_name,
            db = self.database,
        );

        for (table, columns) in &self.tables {
            prompt.push_str(&format!("- {table}({})\n", columns.join(", ")));
        }

        prompt.push_str(&format!(
            "\nReglas:\n\
             - Devuelve solo consultas SQL en formato texto.\n\
             - No ejecutes el SQL.\n\
             - Usa SELECT únicamente.\n\
             - Si no se especifica límite, aplica TOP {limit} por defecto.\n\
             - No incluyas instrucciones peligrosas como {forbidden}.\n\n\
             Pregunta del usuario: {question}\n\n\
             Devuelve solo la consulta SQL correspondiente, sin explicaciones adicionales.\n",
            limit = self.default_limit,
            forbidden = FORBIDDEN_STATEMENTS.join(", "),
        ));

        prompt
    }
}

/// The default MartAI directive over the `Pubs` database.
pub fn sql_context(question: &str) -> String {
    SqlContext::default().render(question)
}
