// Match-scoring prompt templates. Placeholders ({lender_name},
// {lender_data}, {application_data}) are substituted before the call.

pub const MATCH_SCORING_SYSTEM: &str = "You are a financial matching expert specialized in \
    analyzing loan applications against lender policies and calculating accurate match scores. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

pub const MATCH_SCORING_PROMPT: &str = r#"Analyze a loan application against a lender's policy and calculate a match score.

Lender: {lender_name}

Lender Policy Data:
{lender_data}

Loan Application Data:
{application_data}

Analyze the match between this loan application and the lender's policy, considering:
1. **Loan Amount**: Does the requested amount fall within the lender's range?
2. **Loan Type**: Does the lender offer the type of loan requested?
3. **Interest Rate**: Are the applicant's expectations aligned with the lender's rates?
4. **Eligibility Criteria**: Does the applicant meet the lender's requirements?
5. **Tenure**: Is the requested loan tenure available?
6. **Credit Profile**: Does the applicant's credit profile match the lender's criteria?
7. **Income Requirements**: Does the applicant meet income requirements?
8. **Documentation**: Can the applicant provide required documents?
9. **Special Conditions**: Are there any special conditions that affect the match?
10. **Overall Fit**: General compatibility between application and lender policy

Calculate a match score from 0-100 where:
- 90-100: Excellent match, highly recommended
- 75-89: Very good match, recommended
- 60-74: Good match, suitable
- 40-59: Fair match, possible with conditions
- 20-39: Poor match, significant gaps
- 0-19: Very poor match, not recommended

Return ONLY a valid JSON object with the following structure:
{
    "match_score": <number between 0-100>,
    "match_category": "<excellent|very_good|good|fair|poor|very_poor>",
    "strengths": ["<list of matching strengths>"],
    "weaknesses": ["<list of matching weaknesses>"],
    "recommendations": ["<list of recommendations for the applicant>"],
    "criteria_scores": {
        "loan_amount": <0-10>,
        "loan_type": <0-10>,
        "interest_rate": <0-10>,
        "eligibility": <0-10>,
        "tenure": <0-10>,
        "credit_profile": <0-10>,
        "income": <0-10>,
        "documentation": <0-10>,
        "special_conditions": <0-10>,
        "overall_fit": <0-10>
    },
    "summary": "<brief summary of the match analysis>"
}

Be objective and thorough in your analysis. Consider both positive and negative aspects."#;
